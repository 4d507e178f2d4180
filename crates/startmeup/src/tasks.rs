use startmeup_core::ExampleTask;
use startmeup_runtime::Worker;

/// Register every job handler the application ships.
pub fn register(worker: &mut Worker) {
    worker.register(|task: ExampleTask| async move {
        tracing::info!(message = %task.message, "Example task received");
        Ok(())
    });
}
