pub mod probe;
pub mod result;

pub use probe::probe_target;
pub use result::{Classification, ProbeOutcome};

use std::fmt::Write;

/// Render an error together with its whole `source()` chain on one line.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let outer = crate::error::ConfigError::ConfigFileRead {
            path: "critic.yml".into(),
            source: inner,
        };
        assert_eq!(
            report(&outer),
            "failed to read config file critic.yml: connection refused"
        );
    }
}
