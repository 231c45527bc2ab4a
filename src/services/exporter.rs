use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::errors::ExportError;
use crate::models::{ParticipantRecord, TemplateState};
use crate::services::rasterizer::Rasterizer;
use crate::services::renderer::CertificateRenderer;

pub const DEFAULT_SCALE: f32 = 2.0;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    pub scale: f32,
    /// Pause between two consecutive certificates of a batch.
    pub batch_delay: Duration,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Summary of a finished batch. Only produced when every certificate was
/// delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub delivered: Vec<String>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}

/// Destination of exported certificates.
pub trait ArtifactSink: Send + Sync {
    fn deliver(&self, artifact: &ImageArtifact) -> Result<(), ExportError>;
}

/// Writes each certificate into a directory, overwriting same-named files.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver(&self, artifact: &ImageArtifact) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ExportError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.png).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        info!("Saved {} ({} bytes)", path.display(), artifact.png.len());
        Ok(())
    }
}

/// `certificate_{name}_{distance}.png`, with anything that could escape the
/// output directory replaced by `_`.
pub fn certificate_file_name(participant: &ParticipantRecord) -> String {
    format!(
        "certificate_{}_{}.png",
        sanitize_component(&participant.name),
        sanitize_component(&participant.distance)
    )
}

fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

pub struct CertificateExporter {
    renderer: CertificateRenderer,
    rasterizer: Arc<dyn Rasterizer>,
    sink: Arc<dyn ArtifactSink>,
    settings: ExportSettings,
}

impl CertificateExporter {
    pub fn new(
        renderer: CertificateRenderer,
        rasterizer: Arc<dyn Rasterizer>,
        sink: Arc<dyn ArtifactSink>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            renderer,
            rasterizer,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Renders, rasterizes on a blocking worker, and hands the PNG to the sink.
    pub async fn export_one(
        &self,
        participant: &ParticipantRecord,
        template: &TemplateState,
    ) -> Result<ImageArtifact, ExportError> {
        let document = self.renderer.render(participant, template);
        let rasterizer = Arc::clone(&self.rasterizer);
        let scale = self.settings.scale;

        let raster = tokio::task::spawn_blocking(move || rasterizer.rasterize(&document, scale))
            .await
            .map_err(|err| ExportError::Task {
                participant: participant.name.clone(),
                message: err.to_string(),
            })?
            .map_err(|source| ExportError::Raster {
                participant: participant.name.clone(),
                source,
            })?;

        let artifact = ImageArtifact {
            file_name: certificate_file_name(participant),
            width: raster.width,
            height: raster.height,
            png: raster.png,
        };
        self.sink.deliver(&artifact)?;
        Ok(artifact)
    }

    /// Exports one participant at a time with the configured delay between
    /// them. The first failure stops the batch.
    pub async fn export_many<'a, I>(
        &self,
        participants: I,
        template: &TemplateState,
    ) -> Result<BatchReport, ExportError>
    where
        I: IntoIterator<Item = &'a ParticipantRecord>,
    {
        let participants: Vec<&ParticipantRecord> = participants.into_iter().collect();
        let total = participants.len();
        info!("Starting batch export of {} certificates", total);

        let mut report = BatchReport::default();
        for (index, participant) in participants.into_iter().enumerate() {
            if index > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            match self.export_one(participant, template).await {
                Ok(artifact) => {
                    info!("Exported {}/{}: {}", index + 1, total, artifact.file_name);
                    report.delivered.push(artifact.file_name);
                }
                Err(err) => {
                    error!(
                        "Batch export stopped at {} ({}/{}): {}",
                        participant.name,
                        index + 1,
                        total,
                        err
                    );
                    return Err(ExportError::BatchAborted {
                        participant: participant.name.clone(),
                        completed: report.len(),
                        total,
                        source: Box::new(err),
                    });
                }
            }
        }

        info!("Batch export finished: {} certificates", report.len());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RasterError;
    use crate::services::rasterizer::RasterImage;
    use crate::services::scene::{CertificateDocument, NodeRole};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Encodes the runner name instead of pixels; fails on the given call.
    struct FakeRasterizer {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl FakeRasterizer {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    impl Rasterizer for FakeRasterizer {
        fn rasterize(
            &self,
            document: &CertificateDocument,
            scale: f32,
        ) -> Result<RasterImage, RasterError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                return Err(RasterError::Encode("boom".to_string()));
            }
            Ok(RasterImage {
                width: (document.width as f32 * scale) as u32,
                height: (document.height as f32 * scale) as u32,
                png: document.text(NodeRole::RunnerName).unwrap_or_default().as_bytes().to_vec(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, Instant)>>,
    }

    impl ArtifactSink for RecordingSink {
        fn deliver(&self, artifact: &ImageArtifact) -> Result<(), ExportError> {
            self.delivered
                .lock()
                .unwrap()
                .push((artifact.file_name.clone(), Instant::now()));
            Ok(())
        }
    }

    fn participant(id: &str, name: &str) -> ParticipantRecord {
        ParticipantRecord {
            id: id.to_string(),
            name: name.to_string(),
            distance: "10K".to_string(),
            time: "00:45:10".to_string(),
            date: "2025-01-01".to_string(),
            place: "Seoul".to_string(),
        }
    }

    fn exporter(fail_on: Option<usize>, sink: Arc<RecordingSink>) -> CertificateExporter {
        CertificateExporter::new(
            CertificateRenderer::default(),
            Arc::new(FakeRasterizer::new(fail_on)),
            sink,
            ExportSettings::default(),
        )
    }

    #[test]
    fn file_names_stay_inside_output_dir() {
        assert_eq!(
            certificate_file_name(&participant("1", "Kim")),
            "certificate_Kim_10K.png"
        );
        let mut sneaky = participant("2", "../../etc/passwd");
        sneaky.distance = "5K\n\\x".to_string();
        assert_eq!(
            certificate_file_name(&sneaky),
            "certificate_.._.._etc_passwd_5K__x.png"
        );
    }

    #[tokio::test]
    async fn export_one_scales_and_delivers() {
        let sink = Arc::new(RecordingSink::default());
        let artifact = exporter(None, sink.clone())
            .export_one(&participant("1", "Kim"), &TemplateState::default())
            .await
            .unwrap();
        assert_eq!((artifact.width, artifact.height), (1600, 2262));
        assert_eq!(artifact.png, b"Kim".to_vec());
        assert_eq!(artifact.file_name, "certificate_Kim_10K.png");
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_is_sequential_with_delay_between_items() {
        let sink = Arc::new(RecordingSink::default());
        let runners = vec![
            participant("1", "A"),
            participant("2", "B"),
            participant("3", "C"),
        ];
        let start = Instant::now();
        let report = exporter(None, sink.clone())
            .export_many(&runners, &TemplateState::default())
            .await
            .unwrap();

        assert_eq!(
            report.delivered,
            vec![
                "certificate_A_10K.png",
                "certificate_B_10K.png",
                "certificate_C_10K.png"
            ]
        );
        let delivered = sink.delivered.lock().unwrap();
        for pair in delivered.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= DEFAULT_BATCH_DELAY);
        }
        let elapsed = delivered[2].1 - start;
        assert!(elapsed >= DEFAULT_BATCH_DELAY * 2);
        assert!(elapsed < DEFAULT_BATCH_DELAY * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_aborts_remaining_items() {
        let sink = Arc::new(RecordingSink::default());
        let runners: Vec<ParticipantRecord> = (0..5)
            .map(|i| participant(&i.to_string(), &format!("R{i}")))
            .collect();

        let err = exporter(Some(2), sink.clone())
            .export_many(&runners, &TemplateState::default())
            .await
            .unwrap_err();

        match err {
            ExportError::BatchAborted {
                participant,
                completed,
                total,
                source,
            } => {
                assert_eq!(participant, "R2");
                assert_eq!(completed, 2);
                assert_eq!(total, 5);
                assert!(matches!(*source, ExportError::Raster { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(sink.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let sink = Arc::new(RecordingSink::default());
        let report = exporter(None, sink.clone())
            .export_many(&Vec::<ParticipantRecord>::new(), &TemplateState::default())
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn directory_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        let artifact = ImageArtifact {
            file_name: "certificate_Kim_10K.png".to_string(),
            width: 1,
            height: 1,
            png: vec![1, 2, 3],
        };
        sink.deliver(&artifact).unwrap();
        let written =
            std::fs::read(dir.path().join("out").join("certificate_Kim_10K.png")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }
}
