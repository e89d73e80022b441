//! Macro for implementing Display and FromStr for wire-named enums
//!
//! Broadcast event names, vote kinds and insert directions all travel as
//! plain strings. This macro keeps the string form in one place and gives
//! both directions of the conversion.
//!
//! # Example
//!
//! ```rust
//! use plansync_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Dates,
//!     Activities,
//! }
//!
//! impl_wire_name_conversions!(Channel {
//!     Dates => "dates",
//!     Activities => "activities",
//! });
//!
//! assert_eq!(Channel::Dates.to_string(), "dates");
//! assert_eq!("ACTIVITIES".parse::<Channel>(), Ok(Channel::Activities));
//! ```

/// Implements Display and FromStr traits for wire-named enums
///
/// This macro generates:
/// - Display trait: writes the exact wire name
/// - FromStr trait: parses the wire name, ignoring ASCII case
///
/// Also provides an inherent `as_str` returning the `'static` wire name.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire name of this variant.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return ::std::result::Result::Ok(Self::$variant);
                    }
                )+
                ::std::result::Result::Err(::std::format!(
                    "Invalid {}: {}",
                    ::std::stringify!($enum_name),
                    s
                ))
            }
        }
    };
}
