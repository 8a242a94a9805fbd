// One-time free plan claim.

pub mod handlers;
