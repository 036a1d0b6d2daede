use clap::Parser;
use snafu::{Report, ResultExt, Snafu, Whatever};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, Level};

use lesion_texture::dataset::{update_dataset, MergeSummary};
use lesion_texture::errors::{DatasetError, PipelineError};
use lesion_texture::file::ImageFileOperations;
use lesion_texture::lbp::{LbpComputer, LbpMethod, LbpParams, LbpParamsError, DEFAULT_RADIUS};
use lesion_texture::mask::{MaskResolver, DEFAULT_MASK_PATTERNS, ID_PLACEHOLDER};
use lesion_texture::pipeline::FeaturePipeline;
use lesion_texture::radiomics::{NativeExtractor, ParamsError, RadiomicAdapter, RadiomicsParams};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid source path: {}", path.display()))]
    InvalidSourcePath { path: PathBuf },

    #[snafu(display("Error listing sources in {}", path.display()))]
    ListSources {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("No images found in source path: {}", path.display()))]
    NoSources { path: PathBuf },

    #[snafu(display("Invalid mask directory: {}", path.display()))]
    InvalidMaskDirectory { path: PathBuf },

    #[snafu(display("Mask pattern '{}' does not contain {}", pattern, ID_PLACEHOLDER))]
    InvalidMaskPattern { pattern: String },

    #[snafu(display("Invalid LBP parameters: {}", source))]
    LbpParams {
        #[snafu(source(from(LbpParamsError, Box::new)))]
        source: Box<LbpParamsError>,
    },

    #[snafu(display("Error loading extractor parameters: {}", source))]
    Params {
        #[snafu(source(from(ParamsError, Box::new)))]
        source: Box<ParamsError>,
    },

    #[snafu(display("Error building worker pool: {}", source))]
    ThreadPool {
        #[snafu(source(from(rayon::ThreadPoolBuildError, Box::new)))]
        source: Box<rayon::ThreadPoolBuildError>,
    },

    #[snafu(display("Feature extraction failed: {}", source))]
    Pipeline {
        #[snafu(source(from(PipelineError, Box::new)))]
        source: Box<PipelineError>,
    },

    #[snafu(display("Error updating dataset: {}", source))]
    Dataset {
        #[snafu(source(from(DatasetError, Box::new)))]
        source: Box<DatasetError>,
    },
}

#[derive(Parser, Debug)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "Extract radiomic texture and LBP features from lesion images and merge them into a labeled dataset",
    long_about = None
)]
struct Args {
    #[arg(
        help = "Image source. Can be a directory of images named {id}.png or a text file with image paths"
    )]
    source: PathBuf,

    #[arg(help = "Directory containing the masks")]
    masks: PathBuf,

    #[arg(help = "Dataset CSV with an 'id' column. Created if it does not exist")]
    dataset: PathBuf,

    #[arg(
        help = "JSON parameter profile for the radiomic extractor",
        long = "params",
        short = 'p'
    )]
    params: Option<PathBuf>,

    #[arg(
        help = "Mask file name pattern, {id} is replaced by the patient id. Repeat to try several in order",
        long = "mask-pattern",
        short = 'm',
        default_values_t = DEFAULT_MASK_PATTERNS.map(String::from),
    )]
    mask_patterns: Vec<String>,

    #[arg(
        help = "LBP sampling radius",
        long = "lbp-radius",
        short = 'r',
        value_parser = clap::value_parser!(u32).range(1..),
        default_value_t = DEFAULT_RADIUS
    )]
    lbp_radius: u32,

    #[arg(
        help = "Number of LBP sampling points. Defaults to 8 times the radius",
        long = "lbp-points",
        value_parser = clap::value_parser!(u64).range(1..=64)
    )]
    lbp_points: Option<u64>,

    #[arg(
        help = "LBP code definition",
        long = "lbp-method",
        value_parser = clap::value_parser!(LbpMethod),
        default_value_t = LbpMethod::default(),
    )]
    lbp_method: LbpMethod,

    #[arg(
        help = "Abort on the first patient that cannot be processed",
        long = "strict",
        default_value_t = false
    )]
    strict: bool,

    #[arg(
        help = "Number of worker threads. Defaults to all cores",
        long = "jobs",
        short = 'j',
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    jobs: Option<u64>,

    #[arg(
        help = "Enable verbose logging",
        long = "verbose",
        short = 'v',
        default_value_t = false
    )]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(args).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

fn find_sources(args: &Args) -> Result<Vec<PathBuf>, Error> {
    let source = &args.source;
    let sources = if source.is_dir() {
        source.find_images().context(ListSourcesSnafu { path: source })?
    } else if source.is_file() && source.extension().is_some_and(|ext| ext == "txt") {
        source
            .read_image_paths()
            .context(ListSourcesSnafu { path: source })?
    } else if source.is_image_file() {
        vec![source.clone()]
    } else {
        return InvalidSourcePathSnafu { path: source }.fail();
    };
    if sources.is_empty() {
        return NoSourcesSnafu { path: source }.fail();
    }
    Ok(sources)
}

fn build_pipeline(args: &Args) -> Result<FeaturePipeline, Error> {
    if !args.masks.is_dir() {
        return InvalidMaskDirectorySnafu { path: &args.masks }.fail();
    }
    if let Some(pattern) = args
        .mask_patterns
        .iter()
        .find(|p| !p.contains(ID_PLACEHOLDER))
    {
        return InvalidMaskPatternSnafu { pattern }.fail();
    }
    let resolver = MaskResolver::with_patterns(&args.masks, args.mask_patterns.iter().cloned());

    let params = RadiomicsParams::from_optional_file(args.params.as_ref()).context(ParamsSnafu)?;
    let label = params.label;
    let extractor = Arc::new(NativeExtractor::new(params));
    let radiomics = RadiomicAdapter::new(extractor).with_label(label);

    let lbp = LbpComputer::new(LbpParams {
        radius: args.lbp_radius as f64,
        points: args
            .lbp_points
            .map(|p| p as usize)
            .unwrap_or(8 * args.lbp_radius as usize),
        method: args.lbp_method,
    })
    .context(LbpParamsSnafu)?;
    tracing::info!("LBP parameters: {:?}", lbp.params());

    Ok(FeaturePipeline::new(resolver, radiomics, lbp))
}

fn run(args: Args) -> Result<MergeSummary, Error> {
    let sources = find_sources(&args)?;
    tracing::info!("Number of sources found: {}", sources.len());
    let pipeline = build_pipeline(&args)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0) as usize)
        .build()
        .context(ThreadPoolSnafu)?;
    let summary = pool
        .install(|| pipeline.run(&sources, args.strict))
        .context(PipelineSnafu)?;
    summary.log();

    let merged = update_dataset(&args.dataset, &summary.records).context(DatasetSnafu)?;
    tracing::info!(
        "Wrote {} rows with {} feature columns ({} matched, {} unlabeled)",
        merged.rows,
        merged.feature_columns,
        merged.matched,
        merged.unlabeled
    );
    println!("Saved/Updated: {}", args.dataset.display());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::{run, Args, Error};
    use clap::Parser;
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Workspace {
        root: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            std::fs::create_dir(root.path().join("images")).unwrap();
            std::fs::create_dir(root.path().join("masks")).unwrap();
            Self { root }
        }

        fn images(&self) -> PathBuf {
            self.root.path().join("images")
        }

        fn masks(&self) -> PathBuf {
            self.root.path().join("masks")
        }

        fn dataset(&self) -> PathBuf {
            self.root.path().join("dataset.csv")
        }

        fn add_patient(&self, id: &str, with_mask: bool) {
            let mut rng = StdRng::seed_from_u64(id.len() as u64 * 31 + id.as_bytes()[0] as u64);
            let values: Vec<u8> = (0..20 * 20).map(|_| rng.gen()).collect();
            GrayImage::from_raw(20, 20, values)
                .unwrap()
                .save(self.images().join(format!("{}.png", id)))
                .unwrap();
            if with_mask {
                GrayImage::from_pixel(20, 20, Luma([255]))
                    .save(self.masks().join(format!("{}_mask.png", id)))
                    .unwrap();
            }
        }

        fn args(&self, extra: &[&str]) -> Args {
            let images = self.images();
            let masks = self.masks();
            let dataset = self.dataset();
            let mut argv = vec![
                "lesion-texture",
                images.to_str().unwrap(),
                masks.to_str().unwrap(),
                dataset.to_str().unwrap(),
            ];
            argv.extend_from_slice(extra);
            Args::try_parse_from(argv).unwrap()
        }
    }

    /// Rows of a CSV keyed by id, each a column -> cell map
    fn read_rows(path: &Path) -> (Vec<String>, HashMap<String, HashMap<String, String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                let row: HashMap<String, String> = headers
                    .iter()
                    .cloned()
                    .zip(r.iter().map(String::from))
                    .collect();
                (row["id"].clone(), row)
            })
            .collect();
        (headers, rows)
    }

    #[test]
    fn test_creates_dataset() {
        let ws = Workspace::new();
        ws.add_patient("7", true);
        ws.add_patient("9", false);

        let summary = run(ws.args(&["--jobs", "2"])).unwrap();
        assert_eq!(summary.rows, 1);
        assert!(!summary.updated);

        let (headers, rows) = read_rows(&ws.dataset());
        assert_eq!(headers[0], "id");
        assert!(rows.contains_key("7"));
        assert!(!rows.contains_key("9"));
        let mean: f64 = rows["7"]["LBP_mean"].parse().unwrap();
        let entropy: f64 = rows["7"]["LBP_entropy"].parse().unwrap();
        assert!(mean > 0.0);
        assert!(entropy >= 0.0);
        for family in ["glcm", "glrlm", "glszm", "gldm", "ngtdm"] {
            assert!(headers.iter().any(|h| h.contains(family)));
        }
        assert!(!headers.iter().any(|h| h.contains("firstorder")));
    }

    #[test]
    fn test_merges_onto_labels() {
        let ws = Workspace::new();
        ws.add_patient("2", true);
        std::fs::write(ws.dataset(), "id,diagnosis\n1,benign\n2,malignant\n3,benign\n").unwrap();

        let summary = run(ws.args(&[])).unwrap();
        assert_eq!(summary.rows, 3);
        assert!(summary.updated);

        let (headers, rows) = read_rows(&ws.dataset());
        assert_eq!(&headers[..2], &["id", "diagnosis"]);
        assert_eq!(rows["2"]["diagnosis"], "malignant");
        assert!(!rows["2"]["LBP_mean"].is_empty());
        for id in ["1", "3"] {
            assert!(rows[id]["LBP_mean"].is_empty());
            assert!(headers[2..].iter().all(|h| rows[id][h].is_empty()));
        }
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let ws = Workspace::new();
        ws.add_patient("4", true);
        ws.add_patient("5", true);
        std::fs::write(ws.dataset(), "id,diagnosis\n4,1\n5,0\n").unwrap();

        run(ws.args(&[])).unwrap();
        let first = std::fs::read(ws.dataset()).unwrap();
        run(ws.args(&["--jobs", "1"])).unwrap();
        let second = std::fs::read(ws.dataset()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_text_file_source() {
        let ws = Workspace::new();
        ws.add_patient("3", true);
        ws.add_patient("8", true);
        let list = ws.root.path().join("sources.txt");
        std::fs::write(&list, format!("{}\n", ws.images().join("8.png").display())).unwrap();

        let masks = ws.masks();
        let dataset = ws.dataset();
        let args = Args::try_parse_from([
            "lesion-texture",
            list.to_str().unwrap(),
            masks.to_str().unwrap(),
            dataset.to_str().unwrap(),
        ])
        .unwrap();
        run(args).unwrap();
        let (_, rows) = read_rows(&ws.dataset());
        assert_eq!(rows.keys().collect::<Vec<_>>(), vec!["8"]);
    }

    #[test]
    fn test_custom_mask_pattern() {
        let ws = Workspace::new();
        ws.add_patient("6", true);
        std::fs::rename(
            ws.masks().join("6_mask.png"),
            ws.masks().join("seg_6.png"),
        )
        .unwrap();

        let summary = run(ws.args(&["--mask-pattern", "seg_{id}.png"])).unwrap();
        assert_eq!(summary.rows, 1);
    }

    #[test]
    fn test_strict_aborts_without_writing() {
        let ws = Workspace::new();
        ws.add_patient("7", true);
        ws.add_patient("9", false);

        let result = run(ws.args(&["--strict"]));
        assert!(matches!(result, Err(Error::Pipeline { .. })));
        assert!(!ws.dataset().exists());
    }

    #[test]
    fn test_empty_source_directory() {
        let ws = Workspace::new();
        let result = run(ws.args(&[]));
        assert!(matches!(result, Err(Error::NoSources { .. })));
    }

    #[test]
    fn test_invalid_mask_pattern() {
        let ws = Workspace::new();
        ws.add_patient("1", true);
        let result = run(ws.args(&["-m", "mask.png"]));
        assert!(matches!(result, Err(Error::InvalidMaskPattern { .. })));
    }

    #[test]
    fn test_params_profile() {
        let ws = Workspace::new();
        ws.add_patient("1", true);
        let params = ws.root.path().join("params.json");
        std::fs::write(&params, r#"{"feature_classes": ["glcm"]}"#).unwrap();

        run(ws.args(&["--params", params.to_str().unwrap()])).unwrap();
        let (headers, _) = read_rows(&ws.dataset());
        assert!(headers.iter().any(|h| h.starts_with("original_glcm_")));
        assert!(!headers.iter().any(|h| h.contains("glrlm")));
    }

    #[rstest]
    #[case(&["--lbp-radius", "9"])]
    #[case(&["--lbp-method", "default", "--lbp-radius", "3"])]
    #[case(&["--lbp-method", "ror", "--lbp-points", "17"])]
    fn test_unsupported_lbp_parameters(#[case] extra: &[&str]) {
        let ws = Workspace::new();
        ws.add_patient("1", true);
        let result = run(ws.args(extra));
        assert!(matches!(result, Err(Error::LbpParams { .. })));
        assert!(!ws.dataset().exists());
    }

    #[rstest]
    #[case(&["--lbp-points", "0"])]
    #[case(&["--lbp-points", "65"])]
    #[case(&["--lbp-radius", "0"])]
    #[case(&["--jobs", "0"])]
    #[case(&["--lbp-method", "riu2"])]
    fn test_rejected_arguments(#[case] extra: &[&str]) {
        let mut argv = vec!["lesion-texture", "images", "masks", "dataset.csv"];
        argv.extend_from_slice(extra);
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_lbp_defaults() {
        let args = Args::try_parse_from(["lesion-texture", "images", "masks", "dataset.csv"]).unwrap();
        assert_eq!(args.lbp_radius, 2);
        assert_eq!(args.lbp_points, None);
        assert_eq!(args.lbp_method, lesion_texture::LbpMethod::Uniform);
        assert_eq!(args.mask_patterns, vec!["{id}_mask.png", "{id}_pred_mask.png"]);
    }
}
