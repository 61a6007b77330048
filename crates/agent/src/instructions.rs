//! System instructions sent to the model on every round.

use querybridge_config::{AgentConfig, ConfigError};

/// Briefing for the Sakila DVD-rental sample database.
pub const DEFAULT_INSTRUCTIONS: &str = include_str!("sakila.md");

/// The configured instructions, falling back to the Sakila briefing.
pub fn resolve(config: &AgentConfig) -> Result<String, ConfigError> {
    Ok(config
        .load_instructions()?
        .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_briefing_covers_schema_groups() {
        for table in ["FILM", "ACTOR", "INVENTORY", "RENTAL", "PAYMENT", "ADDRESS"] {
            assert!(DEFAULT_INSTRUCTIONS.contains(table), "missing {table}");
        }
    }

    #[test]
    fn falls_back_to_default() {
        let resolved = resolve(&AgentConfig::default()).unwrap();
        assert_eq!(resolved, DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn inline_override_wins() {
        let config = AgentConfig {
            instructions: Some("You help with the chinook music store.".into()),
            ..AgentConfig::default()
        };
        assert_eq!(resolve(&config).unwrap(), "You help with the chinook music store.");
    }
}
