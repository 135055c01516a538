use std::fmt;

use crate::core::Context;

/// Settings shared by every decorator built from one `register`/`open` call.
///
/// A config is built once from a list of [`DriverOption`]s and is never
/// modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Retry limit for conflicting statements.
    ///
    /// `None` leaves the limit to the retry executor's default; it does not
    /// mean "never retry".
    max_retries: Option<usize>,
}

impl Config {
    /// Applies `options` in order to an empty config.
    pub fn new(options: impl IntoIterator<Item = DriverOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }

    pub fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    /// Context for one statement: a child of `ctx` carrying the retry limit,
    /// or a plain clone when no limit is configured.
    pub(crate) fn stamp(&self, ctx: &Context) -> Context {
        match self.max_retries {
            Some(max_retries) => ctx.with_max_retries(max_retries),
            None => ctx.clone(),
        }
    }
}

/// A single configuration step, applied by [`Config::new`].
pub struct DriverOption(Box<dyn FnOnce(&mut Config) + Send>);

impl DriverOption {
    pub(crate) fn new(apply: impl FnOnce(&mut Config) + Send + 'static) -> Self {
        Self(Box::new(apply))
    }

    fn apply(self, config: &mut Config) {
        (self.0)(config)
    }
}

impl fmt::Debug for DriverOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DriverOption(..)")
    }
}

/// Overrides the retry executor's default number of retries.
pub fn with_max_retries(max_retries: usize) -> DriverOption {
    DriverOption::new(move |config| config.max_retries = Some(max_retries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_leaves_retries_unset() {
        let config = Config::new(Vec::<DriverOption>::new());
        assert_eq!(config.max_retries(), None);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_with_max_retries() {
        let config = Config::new([with_max_retries(5)]);
        assert_eq!(config.max_retries(), Some(5));
    }

    #[test]
    fn test_zero_retries_is_distinct_from_unset() {
        let config = Config::new([with_max_retries(0)]);
        assert_eq!(config.max_retries(), Some(0));
    }

    #[test]
    fn test_options_apply_in_order() {
        let config = Config::new([with_max_retries(1), with_max_retries(9)]);
        assert_eq!(config.max_retries(), Some(9));
    }

    #[test]
    fn test_custom_option() {
        let config = Config::new(vec![DriverOption::new(|config| {
            config.max_retries = Some(2)
        })]);
        assert_eq!(config.max_retries(), Some(2));
    }

    #[test]
    fn test_stamp_without_limit_keeps_context_value() {
        let ctx = Context::background().with_max_retries(4);
        assert_eq!(Config::default().stamp(&ctx).max_retries(), Some(4));
    }

    #[test]
    fn test_stamp_does_not_touch_caller_context() {
        let config = Config::new([with_max_retries(3)]);
        let ctx = Context::background();
        let stamped = config.stamp(&ctx);

        assert_eq!(stamped.max_retries(), Some(3));
        assert_eq!(ctx.max_retries(), None);

        ctx.cancel();
        assert!(stamped.is_done());
    }
}
