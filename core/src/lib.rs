//! # Explorer State Core
//!
//! Core traits and types for the entity state lifecycle of a chain explorer.
//!
//! A block explorer renders blocks, transactions, mosaics, namespaces and
//! receipts fetched from a remote node. Every entity-specific store module
//! shares the same state machinery: single-record fetch state, paginated
//! lists with live prepends, and streaming subscriptions. This crate defines
//! the pure parts of that machinery; the `explorer-state-runtime` crate
//! executes it.
//!
//! ## Core Concepts
//!
//! - **State**: Owned, cloneable snapshot of a manager (`FetchState`, paginated list)
//! - **Action**: Every input to a manager, including results fed back by effects
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Description of asynchronous work (a fetch), never executed here
//! - **Environment**: Injected collaborators (fetchers, key selectors)
//!
//! ## Collaborator Seams
//!
//! - [`fetch::Fetcher`] / [`fetch::PageFetcher`]: the remote data source
//! - [`listener::Listener`]: the streaming push-notification transport
//! - [`key::KeySelector`]: the field used to deduplicate list entries
//!
//! ## Example
//!
//! ```ignore
//! use explorer_state_core::{reducer::Reducer, effect::Effect, SmallVec, smallvec};
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         state.count += 1;
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Single-record fetch state and the fetcher seams
pub mod fetch;

/// Labelled filter presets for paginated lists
pub mod filter;

/// Entity key selection for list deduplication
pub mod key;

/// Streaming subscription seam (push notifications)
pub mod listener;

/// Page requests and page results
pub mod page;

pub use fetch::{FetchError, FetchFuture, FetchState, Fetcher, PageFetcher};
pub use filter::FilterOption;
pub use key::KeySelector;
pub use listener::{
    Connection, Endpoint, Listener, NotificationStream, Subscription, SubscriptionError,
};
pub use page::{Page, PageInfo};

/// Reducer module - The core trait for manager logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// All bookkeeping of the explorer managers (loading flags, stale-result
/// discards, deduplicating merges) happens inside a reducer, so it runs
/// synchronously between suspension points and can be tested without a runtime.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for manager logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected collaborators this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for DataSetReducer<u64, Block> {
    ///     type State = DataSetState<u64, Block>;
    ///     type Action = DataSetAction<u64, Block>;
    ///     type Environment = DataSetEnvironment<u64, Block>;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut Self::State,
    ///         action: Self::Action,
    ///         env: &Self::Environment,
    ///     ) -> SmallVec<[Effect<Self::Action>; 4]> {
    ///         match action {
    ///             DataSetAction::Fetch { key, .. } => {
    ///                 // mark loading, describe the fetch
    ///                 smallvec![Effect::None]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected collaborators
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected collaborators
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe asynchronous work to be performed by the runtime.
/// They are values, not execution.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap a future producing an optional feedback action
        pub fn future<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Whether this effect does nothing
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Future(_) => false,
            }
        }
    }
}
