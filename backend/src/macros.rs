//! Shared macros for the backend crate.

/// Implement `fmt::Debug` for a settings struct without leaking credentials.
///
/// Each field is listed with how it should be rendered:
///
/// - `show field` prints the value
/// - `redact field` prints `"[REDACTED]"`
/// - `redact_option field` prints `Some("[REDACTED]")` or `None`
///
/// ```ignore
/// redacted_debug!(PinataConfig {
///     redact jwt,
///     show api_url,
/// });
/// ```
macro_rules! redacted_debug {
    ($name:ident { $( $kind:ident $field:ident ),* $(,)? }) => {
        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let mut s = f.debug_struct(stringify!($name));
                $( redacted_debug!(@field s, self, $kind, $field); )*
                s.finish()
            }
        }
    };
    (@field $s:ident, $self:ident, show, $field:ident) => {
        $s.field(stringify!($field), &$self.$field);
    };
    (@field $s:ident, $self:ident, redact, $field:ident) => {
        $s.field(stringify!($field), &"[REDACTED]");
    };
    (@field $s:ident, $self:ident, redact_option, $field:ident) => {
        $s.field(stringify!($field), &$self.$field.as_ref().map(|_| "[REDACTED]"));
    };
}
