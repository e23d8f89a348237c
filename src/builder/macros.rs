//! Macros for ergonomic state and event declarations.

#[doc(hidden)]
#[macro_export]
macro_rules! __tagged_enum {
    (
        $tag_trait:path;
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( ( $($tuple:tt)* ) )? $( { $($fields:tt)* } )?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $( ( $($tuple)* ) )? $( { $($fields)* } )?
            ),*
        }

        impl $tag_trait for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant { .. } => stringify!($variant),)*
                }
            }
        }
    };
}

/// Declare a state enum and implement [`State`](crate::core::State) for it.
///
/// Variants may be unit, tuple or struct variants; the tag of a value is
/// its variant name. An optional `final:` list generates a `FINAL_STATES`
/// constant for use with `MachineBuilder::final_states`.
///
/// # Example
///
/// ```
/// use statecraft::core::State;
/// use statecraft::state_enum;
///
/// state_enum! {
///     pub enum Job {
///         Queued,
///         Running { attempt: u32 },
///         Done,
///         Failed(String),
///     }
///     final: [Done, Failed]
/// }
///
/// assert_eq!(Job::Running { attempt: 2 }.name(), "Running");
/// assert_eq!(Job::FINAL_STATES, &["Done", "Failed"]);
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($body:tt)* }

        $(final: [$($final:ident),* $(,)?])?
    ) => {
        $crate::__tagged_enum! {
            $crate::core::State;
            $(#[$meta])*
            $vis enum $name { $($body)* }
        }

        $(
            impl $name {
                /// Tags of the variants declared final.
                #[allow(dead_code)]
                pub const FINAL_STATES: &'static [&'static str] = &[$(stringify!($final)),*];
            }
        )?
    };
}

/// Declare an event enum and implement [`Event`](crate::core::Event) for it.
///
/// # Example
///
/// ```
/// use statecraft::core::Event;
/// use statecraft::event_enum;
///
/// event_enum! {
///     pub enum Command {
///         Start,
///         Retry { delay_ms: u64 },
///         Resolve(String),
///     }
/// }
///
/// assert_eq!(Command::Resolve("ok".into()).name(), "Resolve");
/// ```
#[macro_export]
macro_rules! event_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($body:tt)* }
    ) => {
        $crate::__tagged_enum! {
            $crate::core::Event;
            $(#[$meta])*
            $vis enum $name { $($body)* }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Event, State};

    state_enum! {
        enum TestState {
            Initial,
            Processing { step: u32 },
            Complete,
            Failed(String),
        }
        final: [Complete, Failed]
    }

    event_enum! {
        enum TestEvent {
            Begin,
            Step(u32),
            Abort { reason: String },
        }
    }

    #[test]
    fn state_enum_macro_generates_trait() {
        assert_eq!(TestState::Initial.name(), "Initial");
        assert_eq!(TestState::Processing { step: 3 }.name(), "Processing");
        assert_eq!(TestState::Failed("x".into()).name(), "Failed");
        assert_eq!(TestState::FINAL_STATES, &["Complete", "Failed"]);
    }

    #[test]
    fn event_enum_macro_generates_trait() {
        assert_eq!(TestEvent::Begin.name(), "Begin");
        assert_eq!(TestEvent::Step(1).name(), "Step");
        assert_eq!(
            TestEvent::Abort {
                reason: "x".into()
            }
            .name(),
            "Abort"
        );
    }

    #[test]
    fn state_enum_supports_visibility() {
        state_enum! {
            /// Documented.
            pub enum PublicState {
                A,
                B,
            }
        }

        assert_eq!(PublicState::B.name(), "B");
    }

    #[test]
    fn generated_enums_serialize() {
        let state = TestState::Processing { step: 7 };
        let json = serde_json::to_string(&state).unwrap();
        let back: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
