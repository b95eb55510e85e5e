// src/context.rs
//! Context extension traits + macros for error handling.
//!
//! anyhow-like `.context()` / `.with_context()` on `Result` and `Option`, plus `bail!` and
//! `ensure!`, all producing the crate's own `Error`.

use crate::error::{Error, Result};

/// Extension trait giving `.context()` / `.with_context()` on any `Result` whose error converts
/// into the crate `Error`.
pub trait Context<T, E> {
    /// Add static or owned context (eager).
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Into<String>;

    /// Add context lazily; the closure only runs on the error path.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    #[inline(always)]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Into<String>,
    {
        self.map_err(|err| err.into().context(context))
    }

    #[inline(always)]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|err| err.into().context(f()))
    }
}

/// `Option<T>` → `Result<T, Error>` with context.
pub trait OptionContext<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Into<String>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> OptionContext<T> for Option<T> {
    #[inline(always)]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Into<String>,
    {
        self.ok_or_else(|| Error::custom(context))
    }

    #[inline(always)]
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.ok_or_else(|| Error::custom(f()))
    }
}

// ====================== CONVENIENCE MACROS ======================

/// Early return with anything that converts into the crate `Error`.
#[macro_export]
macro_rules! bail {
    ($err:expr $(,)?) => {
        return Err(Into::<$crate::error::Error>::into($err))
    };
}

/// `bail!` with `$err` unless `$cond` holds. The error is only built on failure.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_step(raw: &str) -> Result<f32> {
        let step: f32 = raw
            .parse::<f32>()
            .map_err(|e| Error::config(e.to_string()))
            .context("reading fixed step")?;
        crate::ensure!(step > 0.0, Error::config(format!("fixed step must be positive, got {}", step)));
        Ok(step)
    }

    #[test]
    fn context_wraps_the_source() {
        let err = parse_step("fast").unwrap_err();
        assert!(err.to_string().starts_with("reading fixed step: invalid configuration"));
    }

    #[test]
    fn ensure_formats_message() {
        let err = parse_step("-1").unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.to_string(), "invalid configuration: fixed step must be positive, got -1");
        assert_eq!(parse_step("0.5").unwrap(), 0.5);
    }

    #[test]
    fn bail_converts_foreign_errors() {
        fn open() -> Result<()> {
            crate::bail!(std::io::Error::new(std::io::ErrorKind::NotFound, "demo.json"));
        }
        assert!(matches!(open().unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn option_context_produces_custom_error() {
        let missing: Option<u32> = None;
        let err = missing.with_context(|| "no such body").unwrap_err();
        assert_eq!(err.to_string(), "no such body");
    }
}
