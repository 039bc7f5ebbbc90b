//! Request-scoped state carried through store calls.

use crate::error::{ErrorKind, Result};
use crate::transaction::TxHandle;
use exn::OptionExt;
use tokio_util::sync::CancellationToken;

/// An immutable, cheaply cloneable request value.
///
/// Store helpers look up the ambient transaction here: when one is present
/// they run inside it instead of opening their own, which is what lets them
/// compose without each call site knowing whether it is already inside a
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    tx: Option<TxHandle>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that aborts lock waits once `cancel` fires.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel, tx: None }
    }

    /// A derived context carrying `tx` as its ambient transaction. `self` is
    /// left untouched.
    pub fn with_transaction(&self, tx: TxHandle) -> Self {
        Self { cancel: self.cancel.clone(), tx: Some(tx) }
    }

    pub fn transaction(&self) -> Option<&TxHandle> {
        self.tx.as_ref()
    }

    /// The ambient transaction, or [`ErrorKind::NoTransaction`].
    pub fn require_transaction(&self) -> Result<&TxHandle> {
        self.tx.as_ref().ok_or_raise(|| ErrorKind::NoTransaction)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
