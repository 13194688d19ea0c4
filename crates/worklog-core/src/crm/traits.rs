use crate::error::CrmError;

/// Anything able to receive elapsed work time implements this trait.
/// Submission is fallible and possibly slow; callers record a failure
/// per item and move on -- there is no retry at this layer.
pub trait TimeSink: Send + Sync {
    /// Unique identifier (e.g. "bitrix24").
    fn name(&self) -> &str;

    /// Whether stored credentials exist for the service.
    fn is_authenticated(&self) -> bool;

    /// Book `seconds` of elapsed time against a task on behalf of the
    /// given CRM user, with the timer's note as the comment.
    fn submit_elapsed_time(
        &self,
        task_ref: i64,
        crm_user: i64,
        seconds: i64,
        note: &str,
    ) -> Result<(), CrmError>;
}
