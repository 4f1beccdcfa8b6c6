//! Worker that hands queued jobs to the builders.

use crate::queue::JobReceiver;
use crate::registry::Registry;
use medic_core::BuildOptions;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drains the job queue one job at a time.
pub struct QueueWorker {
    receiver: JobReceiver,
    registry: Arc<Registry>,
}

impl QueueWorker {
    pub fn new(receiver: JobReceiver, registry: Arc<Registry>) -> Self {
        Self { receiver, registry }
    }

    /// Run until every queue handle is dropped. Returns the number of
    /// builds that succeeded.
    pub async fn run(mut self) -> usize {
        info!("Starting queue worker");
        let mut succeeded = 0;

        while let Some(queued) = self.receiver.recv().await {
            for (platform, payload) in queued.job.targets() {
                let Some((builder, output)) = self.registry.builder_for(platform) else {
                    warn!(job_id = %queued.id, platform = %platform, "No builder registered, skipping");
                    continue;
                };

                let options = payload.devices().map(|devices| BuildOptions {
                    devices: devices.clone(),
                });

                info!(
                    job_id = %queued.id,
                    platform = %platform,
                    sha = %payload.sha().short(),
                    devices = options.as_ref().map(|o| o.devices.len()).unwrap_or(0),
                    "Building"
                );

                match builder.build(output, payload.sha(), options.as_ref()).await {
                    Ok(()) => succeeded += 1,
                    Err(e) => {
                        error!(job_id = %queued.id, platform = %platform, error = %e, "Build failed");
                    }
                }
            }
        }

        info!(succeeded, "Queue closed, worker stopping");
        succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobQueue;
    use crate::registry::PlatformBackend;
    use async_trait::async_trait;
    use medic_core::{
        Builder, DeviceInfo, DeviceMap, Error, Job, Platform, Result, Revision,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBuilder {
        calls: Mutex<Vec<(PathBuf, Revision, Option<BuildOptions>)>>,
        fail: bool,
    }

    #[async_trait]
    impl Builder for RecordingBuilder {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn build(
            &self,
            output: &Path,
            revision: &Revision,
            options: Option<&BuildOptions>,
        ) -> Result<()> {
            self.calls.lock().unwrap().push((
                output.to_path_buf(),
                revision.clone(),
                options.cloned(),
            ));
            if self.fail {
                Err(Error::Build("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn backend(name: &str, builder: Arc<RecordingBuilder>) -> PlatformBackend {
        PlatformBackend {
            platform: Platform::new(name),
            project: format!("cordova-{}", name),
            scanner: None,
            builder,
            output: PathBuf::from(format!("temp/{}", name)),
        }
    }

    #[tokio::test]
    async fn test_dispatches_to_platform_and_app_builders() {
        let app = Arc::new(RecordingBuilder::default());
        let android = Arc::new(RecordingBuilder::default());
        let registry = Registry::new(app.clone(), "temp/test")
            .with_platform(backend("android", android.clone()));

        let (queue, receiver) = JobQueue::channel();
        let mut devices = DeviceMap::new();
        devices.insert("d1".to_string(), DeviceInfo::new("v1", "m1"));
        queue.push(Job::devices(Platform::new("android"), Revision::new("c1"), devices.clone()).unwrap());
        queue.push(Job::test_app(Revision::new("t1")));
        drop(queue);

        let succeeded = QueueWorker::new(receiver, Arc::new(registry)).run().await;
        assert_eq!(succeeded, 2);

        let android_calls = android.calls.lock().unwrap();
        assert_eq!(android_calls.len(), 1);
        assert_eq!(android_calls[0].0, PathBuf::from("temp/android"));
        assert_eq!(android_calls[0].1, Revision::new("c1"));
        assert_eq!(android_calls[0].2, Some(BuildOptions { devices }));

        let app_calls = app.calls.lock().unwrap();
        assert_eq!(app_calls.len(), 1);
        assert_eq!(app_calls[0].0, PathBuf::from("temp/test"));
        assert_eq!(app_calls[0].2, None);
    }

    #[tokio::test]
    async fn test_failed_build_does_not_stop_worker() {
        let app = Arc::new(RecordingBuilder::default());
        let ios = Arc::new(RecordingBuilder {
            fail: true,
            ..Default::default()
        });
        let registry = Registry::new(app, "temp/test").with_platform(backend("ios", ios.clone()));

        let (queue, receiver) = JobQueue::channel();
        queue.push(Job::revision(Platform::new("ios"), Revision::new("c1")));
        queue.push(Job::revision(Platform::new("ios"), Revision::new("c2")));
        queue.push(Job::revision(Platform::new("wp8"), Revision::new("c3")));
        drop(queue);

        let succeeded = QueueWorker::new(receiver, Arc::new(registry)).run().await;
        assert_eq!(succeeded, 0);
        assert_eq!(ios.calls.lock().unwrap().len(), 2);
    }
}
