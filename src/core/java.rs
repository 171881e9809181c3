use std::process::Command;

use tracing::debug;

use crate::core::error::{PackError, PackResult};

/// Confirm a Java runtime is reachable on PATH and report its version.
/// The installers shell out to plain `java`; there is no bundled runtime
/// resolution.
pub fn ensure_java() -> PackResult<String> {
    let output = Command::new("java")
        .arg("-version")
        .output()
        .map_err(|_| PackError::JavaNotFound)?;

    if !output.status.success() {
        return Err(PackError::JavaNotFound);
    }

    // Every JVM that matters prints the banner on stderr.
    let banner = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    let version = parse_version_banner(&banner).unwrap_or_else(|| "unknown".to_string());

    debug!("Java runtime detected: {}", version);
    Ok(version)
}

fn parse_version_banner(banner: &str) -> Option<String> {
    banner.lines().find_map(|line| {
        let start = line.find('"')?;
        let rest = &line[start + 1..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::parse_version_banner;

    #[test]
    fn banner_version_is_the_first_quoted_token() {
        let banner = "openjdk version \"17.0.2\" 2022-01-18\n\
                      OpenJDK Runtime Environment (build 17.0.2+8-86)";
        assert_eq!(parse_version_banner(banner).as_deref(), Some("17.0.2"));
    }

    #[test]
    fn banner_without_quotes_yields_none() {
        assert!(parse_version_banner("no version here").is_none());
    }
}
