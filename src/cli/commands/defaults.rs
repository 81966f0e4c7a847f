//! `defaults` command handler.

use crate::config::ProtocolConfig;
use crate::error::DoseWatchError;

/// Prints the default configuration as YAML.
///
/// # Errors
///
/// Returns a YAML error if serialization fails.
pub fn run() -> Result<(), DoseWatchError> {
    print!("{}", render()?);
    Ok(())
}

fn render() -> Result<String, DoseWatchError> {
    Ok(serde_yaml::to_string(&ProtocolConfig::default())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_defaults_load_back() {
        let yaml = render().unwrap();
        let parsed: ProtocolConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, ProtocolConfig::default());
        assert!(yaml.contains("pill_stationary: 60"));
    }
}
