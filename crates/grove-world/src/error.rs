use grove_config::ObjectCategory;

/// Errors that can surface from the world pipeline.
///
/// Steady-state generation recovers from every variant; they exist so callers
/// can decide how loudly to report them.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("noise worker disconnected before delivering a result")]
    WorkerDisconnected,

    #[error("{} has no prefabs to place", .0.name())]
    EmptyPrefabPool(ObjectCategory),
}
