//! End-to-end scenarios through the model manager with mock sessions

use bgremove_manager::{
    BackgroundColor, BgRemovalError, ManagerConfig, MockAcquirer, MockMask, MockSessionBuilder,
    ModelCatalog, ModelDescriptor, ModelManager, ProviderSelector, TransparencyPolicy,
};
use bgremove_manager::providers::StaticProviderProbe;
use image::{ColorType, DynamicImage, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn models_dir(&self) -> PathBuf {
        self.temp.path().join("u2net")
    }

    fn install(&self, file: &str) {
        fs::create_dir_all(self.models_dir()).unwrap();
        fs::write(self.models_dir().join(file), b"weights").unwrap();
    }

    fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.temp.path().join(name);
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        DynamicImage::ImageRgb8(image).save(&path).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    fn manager(&self, catalog: ModelCatalog) -> ModelManager {
        let config = ManagerConfig::builder()
            .models_dir(self.models_dir())
            .build()
            .unwrap();
        ModelManager::builder(config)
            .catalog(catalog)
            .provider_selector(ProviderSelector::new(StaticProviderProbe::new([
                "CPUExecutionProvider",
            ])))
            .session_builder(MockSessionBuilder::new().with_mask(MockMask::Luminance))
            .acquirer(MockAcquirer::new().writing_to(self.models_dir()))
            .build()
            .unwrap()
    }
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    found.sort();
    found
}

#[tokio::test]
async fn photo_with_local_tiny_model_keeps_alpha() {
    let workspace = Workspace::new();
    workspace.install("tiny-model.onnx");
    let input = workspace.image("photo.png", 500, 500);
    let output = workspace.path("photo_out.png");

    let catalog =
        ModelCatalog::new(vec![ModelDescriptor::local("tiny-model", 4 * 1024, "tiny-model")])
            .unwrap();
    let mut manager = workspace.manager(catalog);
    assert!(manager.installed().contains("tiny-model"));

    let result = manager
        .process(&input, &output, "tiny-model", TransparencyPolicy::Keep)
        .await
        .unwrap();

    assert_eq!(result.dimensions(), (500, 500));
    assert_eq!(result.channels, 4);
    let written = image::open(&output).unwrap();
    assert_eq!(written.color(), ColorType::Rgba8);
    assert_eq!((written.width(), written.height()), (500, 500));
}

#[tokio::test]
async fn nonexistent_model_falls_back_to_default() {
    let workspace = Workspace::new();
    workspace.install("u2netp.onnx");
    let input = workspace.image("photo.png", 32, 24);
    let output = workspace.path("photo_out.png");

    let mut manager = workspace.manager(ModelCatalog::builtin());
    let result = manager
        .process(&input, &output, "nonexistent-model", TransparencyPolicy::Keep)
        .await
        .unwrap();

    assert_eq!(result.dimensions(), (32, 24));
    assert!(output.is_file());
}

#[tokio::test]
async fn solid_ten_by_ten_keeps_dimensions() {
    let workspace = Workspace::new();
    workspace.install("u2netp.onnx");
    let input = workspace.path("solid.png");
    DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([20, 200, 40])))
        .save(&input)
        .unwrap();

    let mut manager = workspace.manager(ModelCatalog::builtin());
    let result = manager
        .process(&input, &workspace.path("solid_out.png"), "u2netp", TransparencyPolicy::Keep)
        .await
        .unwrap();

    assert_eq!(result.dimensions(), (10, 10));
    assert_eq!(result.channels, 4);
    assert!(result.has_alpha());
}

#[tokio::test]
async fn composite_onto_white_drops_alpha() {
    let workspace = Workspace::new();
    workspace.install("u2netp.pth");
    workspace.install("u2netp.onnx");
    let input = workspace.image("photo.png", 40, 30);
    let output = workspace.path("photo_flat.png");

    let mut manager = workspace.manager(ModelCatalog::builtin());
    let result = manager
        .process(
            &input,
            &output,
            "u2netp",
            TransparencyPolicy::Composite(BackgroundColor::WHITE),
        )
        .await
        .unwrap();

    assert_eq!(result.channels, 3);
    assert!(!result.has_alpha());
    assert_eq!(image::open(&output).unwrap().color(), ColorType::Rgb8);
}

#[tokio::test]
async fn missing_input_fails_without_writing() {
    let workspace = Workspace::new();
    workspace.install("u2netp.onnx");
    let before = entries(workspace.temp.path());
    let output = workspace.path("out").join("never.png");

    let mut manager = workspace.manager(ModelCatalog::builtin());
    let err = manager
        .process(
            &workspace.path("missing.png"),
            &output,
            "u2netp",
            TransparencyPolicy::Keep,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BgRemovalError::InputNotFound(_)));
    assert_eq!(entries(workspace.temp.path()), before);
    assert_eq!(entries(&workspace.models_dir()), vec![workspace.models_dir().join("u2netp.onnx")]);
}

#[test]
fn composite_requires_explicit_background() {
    assert!(TransparencyPolicy::from_keep_flag(false, None).is_err());
    assert_eq!(
        TransparencyPolicy::from_keep_flag(false, Some(BackgroundColor::BLACK)).unwrap(),
        TransparencyPolicy::Composite(BackgroundColor::BLACK)
    );
}

#[tokio::test]
async fn downloaded_model_becomes_usable() {
    let workspace = Workspace::new();
    let input = workspace.image("photo.png", 16, 16);
    let mut manager = workspace.manager(ModelCatalog::builtin());
    assert!(manager.installed().is_empty());

    let report = manager.download(["u2netp"], |_, _| {}).await.unwrap();
    assert!(report.all_succeeded());
    assert!(manager.installed().contains("u2netp"));

    let result = manager
        .process(&input, &workspace.path("photo_out.png"), "u2netp", TransparencyPolicy::Keep)
        .await
        .unwrap();
    assert_eq!(result.channels, 4);
}

#[tokio::test]
async fn fresh_install_fetches_requested_model_on_first_use() {
    let workspace = Workspace::new();
    let input = workspace.image("photo.png", 20, 12);
    let output = workspace.path("photo_out.png");
    let mut manager = workspace.manager(ModelCatalog::builtin());
    assert!(manager.installed().is_empty());

    let result = manager
        .process(&input, &output, "u2net", TransparencyPolicy::Keep)
        .await
        .unwrap();

    assert_eq!(result.dimensions(), (20, 12));
    assert!(manager.installed().contains("u2net"));
    assert!(workspace.models_dir().join("u2net.onnx").is_file());
    assert_eq!(
        fs::read_to_string(workspace.path("models.txt")).unwrap(),
        "u2net\n"
    );
}
