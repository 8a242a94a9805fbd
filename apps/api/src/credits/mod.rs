// Credit ledger: atomic balance deduction, usage bookkeeping, backend selection.
// Handlers only ever reach balances through `CreditStore`.

pub mod handlers;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod validation;
