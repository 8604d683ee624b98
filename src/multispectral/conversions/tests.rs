#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use approx::assert_relative_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use tiff::encoder::{TiffEncoder, colortype::Gray16};

    use crate::multispectral::capture::Capture;
    use crate::multispectral::common::error::{PreprocessError, Result};
    use crate::multispectral::config::{
        CameraModel, IrradianceMode, ReflectanceConfig, StackConfig, TiffCompression,
    };
    use crate::multispectral::conversions::{
        CaptureOutcome, CaptureStackPipeline, PipelineTimings, ReflectancePipeline, StackOutputs,
        copy_exif_data_to_stacks,
    };
    use crate::multispectral::imaging::{BasicImaging, Homography, IDENTITY};
    use crate::multispectral::metadata::{Metadata, MetadataReader, TagCopier, tags};
    use crate::multispectral::raster::{FloatImage, RasterIo, RawFrame, TiffRasterIo};
    use crate::multispectral::scan::{self, CaptureFiles};

    const SIZE: usize = 20;
    const THERMAL_SIZE: usize = 10;
    const PANEL_LEVEL: u16 = 30000;
    const SENSITIVITY: f64 = 1e-3;
    const EXPOSURE: f64 = 0.001;
    const IRRADIANCE: f64 = 1.25;

    const ALTUM_BANDS: &[&str] = &["Blue", "Green", "Red", "NIR", "RedEdge", "LWIR"];
    const DUAL_BANDS: &[&str] = &[
        "Blue", "Green", "Red", "NIR", "RedEdge",
        "Blue-444", "Green-531", "Red-650", "RedEdge-705", "RedEdge-740",
    ];

    /// Serves camera tags derived from the frame's band suffix.
    struct MockMetadata {
        band_names: &'static [&'static str],
    }

    impl MockMetadata {
        fn altum() -> Self {
            Self { band_names: ALTUM_BANDS }
        }

        fn dual() -> Self {
            Self { band_names: DUAL_BANDS }
        }
    }

    impl MetadataReader for MockMetadata {
        fn read_metadata(&self, path: &Path) -> Result<Metadata> {
            let name = scan::parse_frame_name(path)
                .ok_or_else(|| PreprocessError::MetadataError(format!("{} is not a frame", path.display())))?;
            let band_name = self
                .band_names
                .get(usize::from(name.band) - 1)
                .ok_or_else(|| PreprocessError::MetadataError(format!("no band {}", name.band)))?;
            let values = [
                (tags::BAND_NAME, json!(band_name)),
                (tags::BLACK_LEVEL, json!("0")),
                (tags::EXPOSURE_TIME, json!(EXPOSURE)),
                (tags::ISO_SPEED, json!(100)),
                (tags::RADIOMETRIC_CALIBRATION, json!([SENSITIVITY, 0.0, 0.0])),
                (tags::SPECTRAL_IRRADIANCE, json!(IRRADIANCE)),
                (tags::GPS_ALTITUDE, json!(412.5)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
            Ok(Metadata::new(path, values))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingCopier {
        calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    }

    impl TagCopier for RecordingCopier {
        fn copy_tags(&self, source: &Path, target: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((source.to_path_buf(), target.to_path_buf()));
            Ok(())
        }
    }

    /// Decodes synthetic frames but cannot write.
    struct FailingRaster;

    impl RasterIo for FailingRaster {
        fn read_frame(&self, _path: &Path) -> Result<RawFrame> {
            Ok(RawFrame {
                width: SIZE,
                height: SIZE,
                data: vec![500; SIZE * SIZE],
                bits_per_sample: 16,
            })
        }

        fn write_band(&self, _path: &Path, _image: &FloatImage, _compression: TiffCompression) -> Result<()> {
            Err(PreprocessError::EncodeError("Mock encode error".to_string()))
        }

        fn write_stack(&self, _path: &Path, _bands: &[FloatImage], _compression: TiffCompression) -> Result<()> {
            Err(PreprocessError::EncodeError("Mock encode error".to_string()))
        }

        fn write_rgb_preview(&self, _path: &Path, _rgb: [&FloatImage; 3]) -> Result<()> {
            Err(PreprocessError::EncodeError("Mock encode error".to_string()))
        }
    }

    /// Resolved temp root, so default output paths compare equal.
    fn temp_root() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        (tmp, root)
    }

    fn write_frame(path: &Path, size: usize, pixel: impl Fn(usize, usize) -> u16) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let data: Vec<u16> = (0..size * size).map(|i| pixel(i % size, i / size)).collect();
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<Gray16>(size as u32, size as u32, &data)
            .unwrap();
    }

    fn flight_pixel(x: usize, y: usize) -> u16 {
        (100 + x * 7 + y * 3) as u16
    }

    fn write_capture(dir: &Path, prefix: &str, bands: &[u8]) {
        for band in bands {
            write_frame(&dir.join(format!("{prefix}_{band}.tif")), SIZE, flight_pixel);
        }
    }

    /// `<root>/dataset/0000` holds flight captures, `<root>/dataset/0001` the panel captures.
    fn dataset(root: &Path, flight_bands: &[u8], panel_bands: &[u8]) -> PathBuf {
        let dataset = root.join("dataset");
        write_capture(&dataset.join("0000"), "IMG_0001", flight_bands);
        write_capture(&dataset.join("0000"), "IMG_0002", flight_bands);
        for band in panel_bands {
            write_frame(
                &dataset.join("0001").join(format!("IMG_0100_{band}.tif")),
                SIZE,
                |_, _| PANEL_LEVEL,
            );
        }
        dataset
    }

    fn altum_dataset(root: &Path, panel_bands: &[u8]) -> PathBuf {
        dataset(root, &[1, 2, 3, 4, 5, 6], panel_bands)
    }

    fn reflectance_pipeline(
        config: ReflectanceConfig,
        copier: RecordingCopier,
    ) -> ReflectancePipeline<BasicImaging, MockMetadata, TiffRasterIo, RecordingCopier> {
        ReflectancePipeline::with_custom(BasicImaging::default(), MockMetadata::altum(), TiffRasterIo, copier, config)
    }

    fn stack_pipeline(
        config: StackConfig,
        copier: RecordingCopier,
    ) -> CaptureStackPipeline<BasicImaging, MockMetadata, TiffRasterIo, RecordingCopier> {
        CaptureStackPipeline::with_custom(BasicImaging::default(), MockMetadata::altum(), TiffRasterIo, copier, config)
    }

    fn radiance(raw: u16) -> f64 {
        SENSITIVITY * raw as f64 / 65536.0 / EXPOSURE
    }

    #[test]
    fn test_calibration_covers_all_bands() {
        let tmp = TempDir::new().unwrap();
        let dataset = altum_dataset(tmp.path(), &[1, 2, 3, 4, 5]);

        let calibration = reflectance_pipeline(ReflectanceConfig::default(), RecordingCopier::default())
            .calibrate(&dataset)
            .unwrap();

        assert_eq!(calibration.band_count(), 5);
        assert_relative_eq!(calibration.mean_radiance(), PANEL_LEVEL as f64);
        assert_eq!(calibration.panel_reflectance("NIR").unwrap(), 0.49);
        assert!(calibration.source_frame().starts_with(dataset.join("0001")));
    }

    #[test]
    fn test_incomplete_calibration_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dataset = altum_dataset(tmp.path(), &[1, 2, 3]);
        let copier = RecordingCopier::default();

        let err = reflectance_pipeline(ReflectanceConfig::default(), copier.clone())
            .run(&dataset)
            .unwrap_err();

        match err {
            PreprocessError::IncompletePanelCalibration { found, expected, bands } => {
                assert_eq!((found, expected), (3, 5));
                assert_eq!(bands, vec!["Blue", "Green", "Red"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!tmp.path().join("_radiance_to_reflectance").exists());
        assert!(copier.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reflectance_values_and_layout() {
        let (_tmp, root) = temp_root();
        let dataset = altum_dataset(&root, &[1, 2, 3, 4, 5]);
        let copier = RecordingCopier::default();

        let report = reflectance_pipeline(ReflectanceConfig::default(), copier.clone())
            .run(&dataset)
            .unwrap();

        // Two flight captures and one panel capture, thermal band excluded
        assert_eq!(report.outputs.len(), 15);
        let output = root.join("_radiance_to_reflectance/0000/IMG_0001_3.tif");
        assert!(report.outputs.contains(&output));
        assert!(report.timings.get_step("panel_detection").is_some());

        let written = TiffRasterIo.read_stack(&output).unwrap();
        assert_eq!(written.len(), 1);
        let factor = 0.49 / PANEL_LEVEL as f64;
        for (x, y) in [(0, 0), (7, 3), (19, 19)] {
            let expected = radiance(flight_pixel(x, y)) * factor;
            assert_relative_eq!(written[0].get(x, y) as f64, expected, max_relative = 1e-5);
        }

        let calls = copier.calls.lock().unwrap();
        assert_eq!(calls.len(), 15);
        assert!(calls.contains(&(dataset.join("0000/IMG_0001_3.tif"), output)));
    }

    #[test]
    fn test_dual_camera_converts_all_ten_bands() {
        let (_tmp, root) = temp_root();
        let bands: Vec<u8> = (1..=10).collect();
        let dataset = dataset(&root, &bands, &bands);
        let config = ReflectanceConfig::builder()
            .camera(CameraModel::RedEdgeMxDual)
            .build();
        let pipeline = ReflectancePipeline::with_custom(
            BasicImaging::default(),
            MockMetadata::dual(),
            TiffRasterIo,
            RecordingCopier::default(),
            config,
        );

        let report = pipeline.run(&dataset).unwrap();

        assert_eq!(report.calibration.band_count(), 10);
        assert_eq!(report.outputs.len(), 30);
        let blue_444 = root.join("_radiance_to_reflectance/0000/IMG_0002_6.tif");
        assert!(report.outputs.contains(&blue_444));

        let written = TiffRasterIo.read_stack(&blue_444).unwrap();
        let expected = radiance(flight_pixel(5, 5)) * 0.49 / PANEL_LEVEL as f64;
        assert_relative_eq!(written[0].get(5, 5) as f64, expected, max_relative = 1e-5);
    }

    #[test]
    fn test_reflectance_output_sits_beside_dotted_dataset() {
        let (_tmp, root) = temp_root();
        let dataset = altum_dataset(&root, &[1, 2, 3, 4, 5]);
        let dotted = dataset.join("0000").join("..");
        let pipeline = reflectance_pipeline(ReflectanceConfig::default(), RecordingCopier::default());

        assert_eq!(pipeline.output_dir(&dotted).unwrap(), root.join("_radiance_to_reflectance"));

        pipeline.run(&dotted).unwrap();
        assert!(root.join("_radiance_to_reflectance/0000/IMG_0001_1.tif").is_file());
        assert!(!dataset.join("_radiance_to_reflectance").exists());

        // A rerun still calibrates on the panel directory
        let rerun = pipeline.run(&dotted).unwrap();
        let panel_dir = rerun.calibration.source_frame().parent().and_then(Path::file_name);
        assert_eq!(panel_dir.and_then(|n| n.to_str()), Some("0001"));
    }

    #[test]
    fn test_reflectance_output_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let dataset = altum_dataset(tmp.path(), &[1, 2, 3, 4, 5]);

        let outputs: Vec<Vec<u8>> = ["run_a", "run_b"]
            .iter()
            .map(|run| {
                let config = ReflectanceConfig::builder()
                    .output_dir(Some(tmp.path().join(run)))
                    .build();
                reflectance_pipeline(config, RecordingCopier::default())
                    .run(&dataset)
                    .unwrap();
                fs::read(tmp.path().join(run).join("0000/IMG_0002_5.tif")).unwrap()
            })
            .collect();

        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn test_stack_skips_incomplete_captures() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        write_capture(&input.join("0000"), "IMG_0002", &[1, 2, 3, 4]);

        let report = stack_pipeline(StackConfig::default(), RecordingCopier::default())
            .run(&input)
            .unwrap();

        let stack = root.join("stacks/IMG_0001.tif");
        assert_eq!(report.written, vec![stack.clone()]);
        assert_eq!(report.skipped_incomplete, 1);
        assert_eq!(report.buffers_released, 2);
        assert!(!root.join("stacks/IMG_0002.tif").exists());
        assert!(root.join("thumbnails/IMG_0001.jpg").is_file());

        let bands = TiffRasterIo.read_stack(&stack).unwrap();
        assert_eq!(bands.len(), 5);
        let expected = radiance(flight_pixel(4, 2)) * std::f64::consts::PI / IRRADIANCE;
        assert_relative_eq!(bands[2].get(4, 2) as f64, expected, max_relative = 1e-5);
    }

    #[test]
    fn test_thermal_band_is_stacked_in_celsius() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        // 20 °C, at half the reflective resolution
        write_frame(&input.join("0000/IMG_0001_6.tif"), THERMAL_SIZE, |_, _| 29315);

        let report = stack_pipeline(StackConfig::default(), RecordingCopier::default())
            .run(&input)
            .unwrap();

        assert_eq!(report.written.len(), 1);
        let bands = TiffRasterIo.read_stack(&root.join("stacks/IMG_0001.tif")).unwrap();
        assert_eq!(bands.len(), 6);
        let thermal = &bands[5];
        assert_eq!(thermal.dimensions(), (SIZE, SIZE));
        assert!(thermal.data.iter().all(|t| (t - 20.0).abs() < 1e-3));

        let expected = radiance(flight_pixel(1, 1)) * std::f64::consts::PI / IRRADIANCE;
        assert_relative_eq!(bands[0].get(1, 1) as f64, expected, max_relative = 1e-5);
    }

    #[test]
    fn test_scaled_irradiance_and_warps_are_applied() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        let shift: Homography = [[1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

        let config = StackConfig::builder()
            .irradiance(IrradianceMode::Scaled(vec![2.0, 1.0, 1.0, 1.0, 1.0]))
            .warp_matrices(Some(vec![IDENTITY, shift, IDENTITY, IDENTITY, IDENTITY]))
            .generate_thumbnails(false)
            .build();
        stack_pipeline(config, RecordingCopier::default())
            .run(&input)
            .unwrap();

        let bands = TiffRasterIo.read_stack(&root.join("stacks/IMG_0001.tif")).unwrap();
        let pi = std::f64::consts::PI;
        let blue = radiance(flight_pixel(4, 2)) * pi / (IRRADIANCE * 2.0);
        assert_relative_eq!(bands[0].get(4, 2) as f64, blue, max_relative = 1e-5);

        let green = radiance(flight_pixel(4, 2)) * pi / IRRADIANCE;
        assert_relative_eq!(bands[1].get(3, 2) as f64, green, max_relative = 1e-5);
        assert_eq!(bands[1].get(SIZE - 1, 2), 0.0);
    }

    #[test]
    fn test_short_coefficient_vector_aborts_stacking() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);

        let config = StackConfig::builder()
            .irradiance(IrradianceMode::Scaled(vec![1.0, 1.0]))
            .build();
        let err = stack_pipeline(config, RecordingCopier::default())
            .run(&input)
            .unwrap_err();

        assert!(matches!(err, PreprocessError::CaptureError(_)));
        assert!(!root.join("stacks/IMG_0001.tif").exists());
    }

    #[test]
    fn test_stacks_sit_beside_dotted_input() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        let dotted = input.join("0000").join("..");

        let report = stack_pipeline(StackConfig::default(), RecordingCopier::default())
            .run(&dotted)
            .unwrap();

        assert_eq!(report.written, vec![root.join("stacks/IMG_0001.tif")]);
        assert!(root.join("thumbnails/IMG_0001.jpg").is_file());
        assert!(!input.join("stacks").exists());
        assert!(!input.join("0000/stacks").exists());
    }

    #[test]
    fn test_existing_stack_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        let stack = tmp.path().join("stacks/IMG_0001.tif");
        fs::create_dir_all(stack.parent().unwrap()).unwrap();
        fs::write(&stack, b"previous run").unwrap();

        let config = StackConfig::builder().generate_thumbnails(false).build();
        let report = stack_pipeline(config, RecordingCopier::default())
            .run(&input)
            .unwrap();

        assert_eq!(report.skipped_existing, 1);
        assert!(report.written.is_empty());
        assert_eq!(fs::read(&stack).unwrap(), b"previous run");
        assert!(!tmp.path().join("thumbnails").exists());
    }

    #[test]
    fn test_overwrite_replaces_existing_stack() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        let stack = root.join("stacks/IMG_0001.tif");
        fs::create_dir_all(stack.parent().unwrap()).unwrap();
        fs::write(&stack, b"previous run").unwrap();

        let config = StackConfig::builder()
            .overwrite(true)
            .generate_thumbnails(false)
            .build();
        let report = stack_pipeline(config, RecordingCopier::default())
            .run(&input)
            .unwrap();

        assert_eq!(report.written, vec![stack.clone()]);
        assert_eq!(TiffRasterIo.read_stack(&stack).unwrap().len(), 5);
    }

    #[test]
    fn test_buffers_released_when_stacking_fails() {
        let tmp = TempDir::new().unwrap();
        let frames = (1..=5)
            .map(|band| (band, tmp.path().join(format!("IMG_0001_{band}.tif"))))
            .collect();
        let mut capture = Capture::from(CaptureFiles {
            prefix: "IMG_0001".to_string(),
            dir: tmp.path().to_path_buf(),
            frames,
        });
        let pipeline = CaptureStackPipeline::with_custom(
            BasicImaging::default(),
            MockMetadata::altum(),
            FailingRaster,
            RecordingCopier::default(),
            StackConfig::default(),
        );
        let outputs = StackOutputs {
            stacks_dir: tmp.path().join("stacks"),
            thumbnail_dir: None,
        };

        let result = pipeline.process_capture(&mut capture, 5, &outputs, &mut PipelineTimings::new());

        assert!(matches!(result, Err(PreprocessError::EncodeError(_))));
        assert!(!capture.has_image_data());
        assert_eq!(capture.release_count(), 1);
    }

    #[test]
    fn test_skipped_capture_is_still_released() {
        let tmp = TempDir::new().unwrap();
        let mut capture = Capture::from(CaptureFiles {
            prefix: "IMG_0001".to_string(),
            dir: tmp.path().to_path_buf(),
            frames: vec![(1, tmp.path().join("IMG_0001_1.tif"))],
        });
        let pipeline = stack_pipeline(StackConfig::default(), RecordingCopier::default());
        let outputs = StackOutputs {
            stacks_dir: tmp.path().join("stacks"),
            thumbnail_dir: None,
        };

        let outcome = pipeline
            .process_capture(&mut capture, 5, &outputs, &mut PipelineTimings::new())
            .unwrap();

        assert_eq!(outcome, CaptureOutcome::SkippedIncomplete { found: 1, expected: 5 });
        assert_eq!(capture.release_count(), 1);
    }

    #[test]
    fn test_stack_metadata_copied_from_first_band() {
        let (_tmp, root) = temp_root();
        let input = root.join("flight");
        write_capture(&input.join("0000"), "IMG_0001", &[1, 2, 3, 4, 5]);
        let copier = RecordingCopier::default();

        let config = StackConfig::builder()
            .copy_metadata(true)
            .generate_thumbnails(false)
            .ground_altitude(Some(400.0))
            .build();
        stack_pipeline(config, copier.clone()).run(&input).unwrap();

        let calls = copier.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(
                input.join("0000/IMG_0001_1.tif"),
                root.join("stacks/IMG_0001.tif")
            )]
        );
    }

    #[test]
    fn test_bulk_copy_to_existing_stacks() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("flight");
        let stacks = tmp.path().join("stacks");
        for prefix in ["IMG_0001", "IMG_0002"] {
            for band in 1..=2 {
                let frame = source.join("0000").join(format!("{prefix}_{band}.tif"));
                fs::create_dir_all(frame.parent().unwrap()).unwrap();
                fs::write(frame, b"").unwrap();
            }
        }
        fs::create_dir_all(&stacks).unwrap();
        fs::write(stacks.join("IMG_0002.tif"), b"").unwrap();
        fs::write(stacks.join("notes.txt"), b"").unwrap();
        let copier = RecordingCopier::default();

        let updated = copy_exif_data_to_stacks(&copier, &source, &stacks).unwrap();

        assert_eq!(updated, vec![stacks.join("IMG_0002.tif")]);
        assert_eq!(
            *copier.calls.lock().unwrap(),
            vec![(source.join("0000/IMG_0002_1.tif"), stacks.join("IMG_0002.tif"))]
        );
    }

    #[test]
    fn test_bulk_copy_requires_both_directories() {
        let tmp = TempDir::new().unwrap();
        let err = copy_exif_data_to_stacks(&RecordingCopier::default(), tmp.path(), &tmp.path().join("stacks"))
            .unwrap_err();
        assert!(matches!(err, PreprocessError::NotFound(p) if p == tmp.path().join("stacks")));
    }
}
