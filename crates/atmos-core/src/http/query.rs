use crate::gpio::Level;
use crate::storage::Quantity;

/// What a request URL asks the station for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    Single(Quantity),
    History,
    Dashboard,
    Output { pin: u8, level: Level },
    /// Recognised query with unusable arguments.
    Malformed(String),
    /// No `q` parameter, or one we do not know.
    Index,
}

impl Query {
    /// Parse the `q`, `pin` and `value` parameters of a request target such as
    /// `/?q=output&pin=27&value=1`.
    pub fn parse(url: &str) -> Self {
        let query_string = url.split_once('?').map_or("", |(_, query)| query);

        let mut q = None;
        let mut pin = None;
        let mut value = None;
        for pair in query_string.split('&') {
            let (key, val) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "q" => q = Some(val),
                "pin" => pin = Some(val),
                "value" => value = Some(val),
                _ => {}
            }
        }

        match q {
            Some("all") => Self::All,
            Some("history") => Self::History,
            Some("dashboard") => Self::Dashboard,
            Some("output") => Self::output(pin, value),
            Some(other) => other.parse().map_or(Self::Index, Self::Single),
            None => Self::Index,
        }
    }

    fn output(pin: Option<&str>, value: Option<&str>) -> Self {
        let Some(pin) = pin else {
            return Self::Malformed("output requires a pin".into());
        };
        let Ok(pin) = pin.parse::<u8>() else {
            return Self::Malformed(format!("invalid pin {:?}", pin));
        };
        match value.and_then(Level::from_query) {
            Some(level) => Self::Output { pin, level },
            None => Self::Malformed("output requires value=0 or value=1".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_queries() {
        assert_eq!(Query::parse("/?q=all"), Query::All);
        assert_eq!(Query::parse("/?q=history"), Query::History);
        assert_eq!(Query::parse("/?q=dashboard"), Query::Dashboard);
        assert_eq!(
            Query::parse("/?q=temperature"),
            Query::Single(Quantity::Temperature)
        );
        assert_eq!(Query::parse("/?q=co2"), Query::Single(Quantity::Co2));
        assert_eq!(
            Query::parse("/?q=distance"),
            Query::Single(Quantity::DigitalInputs)
        );
    }

    #[test]
    fn test_output() {
        assert_eq!(
            Query::parse("/?q=output&pin=27&value=1"),
            Query::Output {
                pin: 27,
                level: Level::High
            }
        );
        assert_eq!(
            Query::parse("/?value=0&pin=29&q=output"),
            Query::Output {
                pin: 29,
                level: Level::Low
            }
        );
    }

    #[test]
    fn test_malformed_output() {
        assert!(matches!(Query::parse("/?q=output"), Query::Malformed(_)));
        assert!(matches!(
            Query::parse("/?q=output&pin=300&value=1"),
            Query::Malformed(_)
        ));
        assert!(matches!(
            Query::parse("/?q=output&pin=27&value=2"),
            Query::Malformed(_)
        ));
    }

    #[test]
    fn test_unknown_is_index() {
        assert_eq!(Query::parse("/"), Query::Index);
        assert_eq!(Query::parse("/?q=humidity"), Query::Index);
        assert_eq!(Query::parse("/favicon.ico"), Query::Index);
    }
}
