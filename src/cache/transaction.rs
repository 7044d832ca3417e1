//! Transaction Module
//!
//! Runs operations through a storage engine's transactional executor and
//! collapses its outcome shapes into a plain `Result`.

use tracing::debug;

// == Committed Payload ==
/// What a committed (atomic) transaction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed<T, E> {
    /// A bare value, not yet wrapped as a result
    Value(T),
    /// An already successful result
    Ok(T),
    /// An application error raised inside a committed transaction
    Error(E),
}

impl<T, E> From<Result<T, E>> for Committed<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Committed::Ok(value),
            Err(reason) => Committed::Error(reason),
        }
    }
}

// == Transaction Outcome ==
/// Raw outcome returned by a transactional executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction<T, E> {
    /// The transaction committed
    Atomic(Committed<T, E>),
    /// The engine aborted the transaction; no writes were applied
    Aborted(E),
}

/// Normalized two-shape outcome seen by every caller.
pub type TransactionResult<T, E> = Result<T, E>;

// == Transaction Executor ==
/// A storage engine able to run an operation atomically.
///
/// The operation receives exclusive access to the table. Returning `Err`
/// aborts the transaction with that reason.
pub trait TransactionExecutor {
    /// Mutable view the operation runs against
    type Table;
    /// Abort and error reason type
    type Reason;

    fn execute<T, F>(&self, operation: F) -> Transaction<T, Self::Reason>
    where
        F: FnOnce(&mut Self::Table) -> Result<Committed<T, Self::Reason>, Self::Reason>;
}

// == Normalize ==
/// Collapses a raw outcome into `Ok`/`Err`.
pub fn normalize<T, E>(transaction: Transaction<T, E>) -> TransactionResult<T, E> {
    match transaction {
        Transaction::Atomic(Committed::Error(reason)) => Err(reason),
        Transaction::Atomic(Committed::Ok(value)) => Ok(value),
        Transaction::Atomic(Committed::Value(value)) => Ok(value),
        Transaction::Aborted(reason) => Err(reason),
    }
}

/// Like [`normalize`], but a bare committed value is replaced by `replacement`.
///
/// Pre-wrapped `Ok` values pass through; failures ignore the replacement.
pub fn normalize_with<T, E>(
    transaction: Transaction<T, E>,
    replacement: T,
) -> TransactionResult<T, E> {
    match transaction {
        Transaction::Atomic(Committed::Value(_)) => Ok(replacement),
        other => normalize(other),
    }
}

// == Transaction Normalizer ==
/// Entry point used by cache operations touching storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionNormalizer;

impl TransactionNormalizer {
    /// Executes `operation` on `executor` and normalizes the outcome.
    pub fn run<X, T, F>(executor: &X, operation: F) -> TransactionResult<T, X::Reason>
    where
        X: TransactionExecutor,
        X::Reason: std::fmt::Debug,
        F: FnOnce(&mut X::Table) -> Result<Committed<T, X::Reason>, X::Reason>,
    {
        let transaction = executor.execute(operation);
        if let Transaction::Aborted(reason) = &transaction {
            debug!("Transaction aborted: {:?}", reason);
        }
        normalize(transaction)
    }

    /// Executes `operation` and reports `replacement` instead of a bare
    /// committed value.
    pub fn run_with<X, T, F>(
        executor: &X,
        operation: F,
        replacement: T,
    ) -> TransactionResult<T, X::Reason>
    where
        X: TransactionExecutor,
        X::Reason: std::fmt::Debug,
        F: FnOnce(&mut X::Table) -> Result<Committed<T, X::Reason>, X::Reason>,
    {
        let transaction = executor.execute(operation);
        if let Transaction::Aborted(reason) = &transaction {
            debug!("Transaction aborted: {:?}", reason);
        }
        normalize_with(transaction, replacement)
    }
}
