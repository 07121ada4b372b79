pub mod allocation_svc;
pub mod context_svc;
pub mod credential_svc;
pub mod identity_svc;
pub mod reconciler_svc;
pub mod release_svc;
pub mod store_svc;

#[cfg(test)]
pub mod mock;
