//! File replication between the manager and its workers.
//!
//! Two mechanisms cover the deployment's needs: the manager pushes freshly
//! written artifacts to every worker host, and each worker additionally
//! pulls the manager's static directory on a jittered timer so it converges
//! even when pushes were missed.

pub mod pull;
pub mod push;

pub use pull::PullWorker;
pub use push::WorkerPusher;
