//! Code registry: bidirectional mapping between external code strings and domain enums.
//!
//! Every domain enum that is fed from an external vocabulary implements [`ExternalCode`], listing
//! its constants and the single external code each one answers to. A [`CodeRegistry`] is built
//! once per enum type by an explicit [`CodeRegistry::register`] call at startup.
//!
//! - Duplicate mappings are programming errors and fail registration.
//! - Unknown codes at lookup time are normal (external vocabularies grow faster than the engine)
//!   and simply return `None`.

use crate::{EngineError, EngineResult};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::OnceLock;

/// A closed set of domain constants, each exposing exactly one external code.
pub trait ExternalCode: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Human-readable registry name used in configuration errors.
    const REGISTRY: &'static str;

    /// Every constant of the type, in declaration order.
    const ALL: &'static [Self];

    /// The external code this constant is mapped from.
    fn code(&self) -> &'static str;
}

/// Declares a domain enum together with its [`ExternalCode`] table.
macro_rules! external_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident in $registry:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $crate::codes::ExternalCode for $name {
            const REGISTRY: &'static str = $registry;
            const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            fn code(&self) -> &'static str {
                match self {
                    $( Self::$variant => $code, )+
                }
            }
        }
    };
}

pub(crate) use external_codes;

/// Forward (`code -> constant`) map, with the reverse map built on first use.
#[derive(Debug)]
pub struct CodeRegistry<E: ExternalCode> {
    forward: HashMap<&'static str, E>,
    reverse: OnceLock<HashMap<E, &'static str>>,
}

impl<E: ExternalCode> CodeRegistry<E> {
    /// Builds the registry for `E` from its compile-time constant table.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DuplicateCode`] if two constants claim the same code.
    /// - [`EngineError::DuplicateConstant`] if a constant is listed twice (it would be reachable
    ///   from more than one code).
    /// - [`EngineError::InvalidConfig`] if a code is blank or carries surrounding whitespace.
    pub fn register() -> EngineResult<Self> {
        let mut forward: HashMap<&'static str, E> = HashMap::with_capacity(E::ALL.len());
        let mut seen: HashSet<E> = HashSet::with_capacity(E::ALL.len());

        for &constant in E::ALL {
            if !seen.insert(constant) {
                return Err(EngineError::DuplicateConstant {
                    registry: E::REGISTRY,
                    constant: format!("{constant:?}"),
                });
            }

            let code = constant.code();
            if code.is_empty() || code.trim() != code {
                return Err(EngineError::InvalidConfig(format!(
                    "{} has an unusable code {code:?} for {constant:?}",
                    E::REGISTRY
                )));
            }

            if let Some(previous) = forward.insert(code, constant) {
                return Err(EngineError::DuplicateCode {
                    registry: E::REGISTRY,
                    code,
                    first: format!("{previous:?}"),
                    second: format!("{constant:?}"),
                });
            }
        }

        tracing::debug!("registered {} codes for {}", forward.len(), E::REGISTRY);

        Ok(Self {
            forward,
            reverse: OnceLock::new(),
        })
    }

    /// Looks up the constant for an external code. Surrounding whitespace is ignored.
    pub fn lookup(&self, code: &str) -> Option<E> {
        self.forward.get(code.trim()).copied()
    }

    /// Reverse lookup: the external code registered for `value`.
    pub fn code_of(&self, value: E) -> Option<&'static str> {
        self.reverse
            .get_or_init(|| self.forward.iter().map(|(code, e)| (*e, *code)).collect())
            .get(&value)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
