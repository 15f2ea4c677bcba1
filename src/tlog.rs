use std::io::Write as _;
use std::sync::RwLock;

static LOG_LEVEL: RwLock<slog::Level> = RwLock::new(slog::Level::Info);

pub fn set_log_level(lvl: slog::Level) {
    *LOG_LEVEL.write().unwrap_or_else(|e| e.into_inner()) = lvl;
}

#[inline]
pub fn log_level() -> slog::Level {
    *LOG_LEVEL.read().unwrap_or_else(|e| e.into_inner())
}

pub struct Drain;

pub fn root() -> slog::Logger {
    slog::Logger::root(Drain, slog::o!())
}

#[macro_export]
macro_rules! tlog {
    ($lvl:ident, $($args:tt)*) => {{
        let logger = $crate::tlog::root();
        slog::slog_log!(logger, slog::Level::$lvl, "", $($args)*);
    }}
}

impl slog::Drain for Drain {
    type Ok = ();
    type Err = slog::Never;
    fn log(
        &self,
        record: &slog::Record,
        values: &slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        // Max level is constant = trace, it's hardcoded in Cargo.toml
        // dependency features. In runtime it's managed by `set_log_level`.
        if !record.level().is_at_least(log_level()) {
            return Ok(());
        }

        let line = StrSerializer::format_message(record, values);
        // Nothing sensible to do if stderr is gone.
        let _ = writeln!(
            std::io::stderr().lock(),
            "{}: {line}",
            record.level().as_short_str()
        );
        Ok(())
    }
}

pub struct StrSerializer {
    pub str: String,
}

impl StrSerializer {
    pub fn format_message(record: &slog::Record, values: &slog::OwnedKVList) -> String {
        use slog::KV;
        let mut s = StrSerializer {
            str: format!("{}", record.msg()),
        };
        // StrSerializer only fails on formatting errors, a partial line is
        // still worth printing.
        let _ = record.kv().serialize(record, &mut s);
        let _ = values.serialize(record, &mut s);
        s.str
    }
}

impl slog::Serializer for StrSerializer {
    fn emit_arguments(&mut self, key: slog::Key, val: &std::fmt::Arguments) -> slog::Result {
        use std::fmt::Write;
        write!(&mut self.str, ", {key}: {val}").map_err(slog::Error::Fmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Level;

    #[test]
    fn level_filter_roundtrip() {
        set_log_level(Level::Debug);
        assert_eq!(log_level(), Level::Debug);
        set_log_level(Level::Info);
        assert_eq!(log_level(), Level::Info);
    }

    #[test]
    fn message_with_key_values() {
        struct Capture(std::sync::Mutex<Vec<String>>);
        impl slog::Drain for Capture {
            type Ok = ();
            type Err = slog::Never;
            fn log(
                &self,
                record: &slog::Record,
                values: &slog::OwnedKVList,
            ) -> Result<(), slog::Never> {
                let line = StrSerializer::format_message(record, values);
                self.0.lock().unwrap().push(line);
                Ok(())
            }
        }

        let capture = std::sync::Arc::new(Capture(Default::default()));
        let logger = slog::Logger::root(capture.clone(), slog::o!("stmt" => 7));
        slog::info!(logger, "attached"; "route" => 2);
        let lines = capture.0.lock().unwrap();
        assert_eq!(lines.as_slice(), ["attached, route: 2, stmt: 7"]);
    }
}
