use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use console::style;
use indicatif::MultiProgress;

use crate::core::config::Config;
use crate::core::convert::convert_modpack;
use crate::core::error::{PackError, PackResult};

#[derive(Parser)]
#[command(version, about = "Convert a client modpack into a dedicated server")]
pub struct Cli {
    /// Path to the modpack archive (.zip or .mrpack). Prompted for when
    /// omitted.
    pub modpack: Option<PathBuf>,

    /// Directory under which server instances are created
    #[arg(short, long, default_value = "instance")]
    pub output: PathBuf,

    /// Download from origin hosts instead of the community mirror
    #[arg(long)]
    pub no_mirror: bool,

    /// CurseForge API key override
    #[arg(long)]
    pub api_key: Option<String>,
}

pub async fn run(cli: Cli) -> PackResult<()> {
    // Prompts only appear when the archive was not given on the command
    // line; a scripted invocation never blocks on stdin.
    let interactive = cli.modpack.is_none();

    let modpack = match cli.modpack {
        Some(path) => path,
        None => prompt_path("Modpack archive path: ")?,
    };

    let use_mirror = if cli.no_mirror {
        false
    } else if interactive {
        confirm("Prefer the community mirror (recommended)?", true)?
    } else {
        true
    };

    let stem = modpack
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "server".to_string());
    let instance_dir = cli.output.join(stem);

    let mut config = Config::new(instance_dir, use_mirror);
    if let Some(key) = cli.api_key {
        config = config.with_api_key(key);
    }

    let progress = MultiProgress::new();
    let report = convert_modpack(&modpack, config, Some(progress)).await?;

    println!();
    println!(
        "{} Server pack ready: {}",
        style("✓").green().bold(),
        style(report.instance_dir.display()).bold()
    );
    println!(
        "  Minecraft {} with {} {}",
        report.pack_info.minecraft_version,
        report.pack_info.loader,
        report.pack_info.loader_version
    );
    println!(
        "  {} mods downloaded, {} failed, {} client-only mods removed",
        report.mods_downloaded, report.mods_failed, report.client_mods_removed
    );

    Ok(())
}

fn confirm(question: &str, default_yes: bool) -> PackResult<bool> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    print!("{} ({}) ", question, hint);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(match answer.as_str() {
        "" => default_yes,
        s => s.starts_with('y'),
    })
}

fn prompt_path(question: &str) -> PackResult<PathBuf> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    // Dragging a file into most terminals quotes the path.
    let trimmed = input.trim().trim_matches(|c| c == '\'' || c == '"');
    if trimmed.is_empty() {
        return Err(PackError::Pack("no modpack path provided".into()));
    }
    Ok(PathBuf::from(trimmed))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_parse_alongside_the_archive() {
        let cli = Cli::try_parse_from([
            "serverpacker",
            "pack.zip",
            "--no-mirror",
            "--output",
            "servers",
        ])
        .unwrap();

        assert_eq!(cli.modpack.as_deref(), Some(std::path::Path::new("pack.zip")));
        assert!(cli.no_mirror);
        assert_eq!(cli.output, PathBuf::from("servers"));
        assert!(cli.api_key.is_none());
    }
}
