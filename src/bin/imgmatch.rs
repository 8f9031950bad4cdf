use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use env_logger::Env;
use imgmatch_rust::imgmemory::MemoryStorage;
use imgmatch_rust::imgstructs::{
    SignatureOptions, StoreConfig, DEFAULT_GRID_POINT_NUM, DEFAULT_LEVEL, DEFAULT_WORD_NUMBER,
    DEFAULT_WORD_WIDTH,
};
use imgmatch_rust::{
    make_simple_words, normalized_distance, ImageSignature, PixelBuffer, SignatureStore,
    DEFAULT_MATCH_THRESHOLD,
};
use log::{debug, info, LevelFilter};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

type Metadata = BTreeMap<String, String>;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Grid points per axis
    #[clap(long, value_parser, default_value_t = DEFAULT_GRID_POINT_NUM)]
    grid: usize,

    /// Positive/negative brightness strata
    #[clap(long, value_parser, default_value_t = DEFAULT_LEVEL)]
    level: i32,

    /// Lower crop percentile
    #[clap(long, value_parser, default_value_t = 0)]
    crop_lower: u8,

    /// Upper crop percentile
    #[clap(long, value_parser, default_value_t = 100)]
    crop_upper: u8,

    /// Sample the 3x3 mean instead of the single pixel
    #[clap(long)]
    average_pixel: bool,

    /// Signature entries per word
    #[clap(long, value_parser, default_value_t = DEFAULT_WORD_WIDTH)]
    word_width: usize,

    /// Words per signature
    #[clap(long, value_parser, default_value_t = DEFAULT_WORD_NUMBER)]
    word_number: usize,

    /// Matches must be strictly below this distance
    #[clap(long, value_parser, default_value_t = DEFAULT_MATCH_THRESHOLD)]
    threshold: f64,

    /// Enable console output in addition to file logging
    #[clap(long)]
    console: bool,

    /// Override the log directory [default: ./logs]
    #[clap(long, value_parser)]
    log_dir: Option<String>,

    /// Override the log file name [default: imgmatch.log]
    #[clap(long, value_parser)]
    log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the signature of an image
    Sign {
        /// PPM (P6) or PAM (P7) image
        image: PathBuf,
        /// Also print the encoded words
        #[clap(long)]
        words: bool,
    },
    /// Print the distance between two images
    Compare { left: PathBuf, right: PathBuf },
    /// Sign an image and store it in a JSON database
    Index {
        /// Database file, created when missing
        #[clap(long, value_parser)]
        db: PathBuf,
        /// Record key
        #[clap(long, value_parser)]
        key: String,
        image: PathBuf,
        /// Metadata entry, repeatable
        #[clap(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Find stored images matching an image
    Search {
        #[clap(long, value_parser)]
        db: PathBuf,
        image: PathBuf,
        /// Also search the 90, 180 and 270 degree rotations
        #[clap(long)]
        all_orientations: bool,
    },
    /// Remove a record from a JSON database
    Delete {
        #[clap(long, value_parser)]
        db: PathBuf,
        #[clap(long, value_parser)]
        key: String,
    },
}

fn parse_meta(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((k.to_string(), v.to_string()))
}

fn init_logging(args: &Args) -> Result<()> {
    let default_log_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let mut builder = Builder::from_env(Env::new().default_filter_or(default_log_level));

    if cfg!(debug_assertions) {
        builder.filter_module("imgmatch_rust", LevelFilter::Debug);
    } else {
        builder.filter_module("imgmatch_rust", LevelFilter::Info);
    }

    #[cfg(feature = "trace_signature")]
    builder.filter_module("imgmatch_rust::imgsig", LevelFilter::Trace);

    // Without --console, keep stderr quiet; results go to stdout
    if !args.console {
        builder.is_test(true);
    }

    if let Some(dir) = &args.log_dir {
        let log_file = args.log_file.as_deref().unwrap_or("imgmatch.log");
        let log_path = Path::new(dir).join(log_file);
        std::fs::create_dir_all(dir)?;
        let file = File::create(&log_path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    info!(
        "Logging initialized with console={}, log_dir={:?}, log_file={:?}",
        args.console, args.log_dir, args.log_file
    );
    Ok(())
}

fn store_config(args: &Args) -> StoreConfig {
    let signature = SignatureOptions {
        grid_point_num: args.grid,
        level: args.level,
        crop_percentiles: (args.crop_lower, args.crop_upper),
        use_average_pixel: args.average_pixel,
        ..SignatureOptions::default()
    };
    StoreConfig {
        word_width: args.word_width,
        word_number: args.word_number,
        match_threshold: args.threshold,
        signature,
    }
}

fn open_db(path: &Path, must_exist: bool) -> Result<MemoryStorage<Metadata>> {
    if path.exists() {
        info!("Loading database {}", path.display());
        return MemoryStorage::load_json(path)
            .with_context(|| format!("loading database {}", path.display()));
    }
    if must_exist {
        return Err(anyhow!("Database {} does not exist", path.display()));
    }
    info!("Creating database {}", path.display());
    Ok(MemoryStorage::new())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("{}", imgmatch_rust::get_version());
    debug!("Build: {}", imgmatch_rust::get_build_info());
    info!(
        "Command line: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );

    let config = store_config(&args);

    match &args.command {
        Command::Sign { image, words } => {
            let generator = ImageSignature::new(config.signature.clone())?;
            let signature = generator.generate(&read_image(image)?)?;
            let mut out = json!({ "signature": signature });
            if *words {
                let words = make_simple_words(&signature, config.word_width, config.word_number)?;
                out["words"] = json!(words);
            }
            println!("{}", out);
        }
        Command::Compare { left, right } => {
            let generator = ImageSignature::new(config.signature.clone())?;
            let a = generator.generate(&read_image(left)?)?;
            let b = generator.generate(&read_image(right)?)?;
            let dist = normalized_distance(&a, &b);
            println!(
                "{}",
                json!({ "dist": dist, "match": dist < config.match_threshold })
            );
        }
        Command::Index {
            db,
            key,
            image,
            meta,
        } => {
            let storage = open_db(db, false)?;
            let mut store: SignatureStore<_, Metadata> =
                SignatureStore::with_config(storage, config)?;
            let metadata: Metadata = meta.iter().cloned().collect();
            store.index(key, &read_image(image)?, metadata)?;
            store.storage().save_json(db)?;
            info!("Stored `{}` in {}", key, db.display());
        }
        Command::Search {
            db,
            image,
            all_orientations,
        } => {
            let storage = open_db(db, true)?;
            let store: SignatureStore<_, Metadata> = SignatureStore::with_config(storage, config)?;
            let matches = store.search(&read_image(image)?, *all_orientations)?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Command::Delete { db, key } => {
            let storage = open_db(db, true)?;
            let mut store: SignatureStore<_, Metadata> =
                SignatureStore::with_config(storage, config)?;
            store.delete(key)?;
            store.storage().save_json(db)?;
        }
    }

    Ok(())
}

// ==============================================
// Netpbm readers
// ==============================================

fn read_image(path: &Path) -> Result<PixelBuffer> {
    info!("Reading image: {}", path.display());
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (width, height, rgba) = match bytes.get(..2) {
        Some(b"P6") => read_ppm(&bytes)?,
        Some(b"P7") => read_pam(&bytes)?,
        _ => return Err(anyhow!("Unsupported image format: {}", path.display())),
    };
    info!("Image dimensions: {}x{}", width, height);
    Ok(PixelBuffer::from_rgba(width as u32, height as u32, &rgba)?)
}

/// Next whitespace-separated header number, skipping `#` comments.
fn next_header_number(bytes: &[u8], pos: &mut usize) -> Result<usize> {
    loop {
        match bytes.get(*pos) {
            Some(b) if b.is_ascii_whitespace() => *pos += 1,
            Some(b'#') => {
                while bytes.get(*pos).is_some_and(|&b| b != b'\n') {
                    *pos += 1;
                }
            }
            Some(_) => break,
            None => return Err(anyhow!("Truncated PPM header")),
        }
    }
    let start = *pos;
    while bytes.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }
    let token = std::str::from_utf8(&bytes[start..*pos])?;
    token
        .parse::<usize>()
        .with_context(|| format!("Invalid PPM header value `{token}`"))
}

/// The `width * height * depth` bytes following the header at `pos`.
fn raster<'a>(bytes: &'a [u8], pos: usize, dims: [usize; 3], format: &str) -> Result<&'a [u8]> {
    let expected = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| anyhow!("{format} dimensions {}x{}x{} overflow", dims[0], dims[1], dims[2]))?;
    pos.checked_add(expected)
        .and_then(|end| bytes.get(pos..end))
        .ok_or_else(|| anyhow!("{format} raster too short: expected {expected} bytes"))
}

fn read_ppm(bytes: &[u8]) -> Result<(usize, usize, Vec<u8>)> {
    let mut pos = 2;
    let width = next_header_number(bytes, &mut pos)?;
    let height = next_header_number(bytes, &mut pos)?;
    let maxval = next_header_number(bytes, &mut pos)?;
    if maxval != 255 {
        return Err(anyhow!("Unsupported PPM maxval {maxval}, only 255 is handled"));
    }
    // exactly one whitespace byte separates the header from the raster
    pos += 1;

    let data = raster(bytes, pos, [width, height, 3], "PPM")?;
    let rgba = data
        .chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect();
    Ok((width, height, rgba))
}

fn read_pam(bytes: &[u8]) -> Result<(usize, usize, Vec<u8>)> {
    let mut header: BTreeMap<String, String> = BTreeMap::new();
    let mut pos = 0;
    loop {
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .ok_or_else(|| anyhow!("PAM header is missing ENDHDR"))?;
        let line = std::str::from_utf8(&bytes[pos..end])?.trim();
        pos = end + 1;
        if line == "ENDHDR" {
            break;
        }
        if line.is_empty() || line.starts_with('#') || line == "P7" {
            continue;
        }
        let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        header.insert(key.to_string(), value.trim().to_string());
    }

    let field = |name: &str| -> Result<usize> {
        let value = header
            .get(name)
            .ok_or_else(|| anyhow!("PAM header is missing {name}"))?;
        value
            .parse::<usize>()
            .with_context(|| format!("Invalid PAM {name} `{value}`"))
    };
    let width = field("WIDTH")?;
    let height = field("HEIGHT")?;
    let depth = field("DEPTH")?;
    if field("MAXVAL")? != 255 {
        return Err(anyhow!("Unsupported PAM maxval, only 255 is handled"));
    }
    match (header.get("TUPLTYPE").map(String::as_str), depth) {
        (Some("RGB_ALPHA"), 4) | (Some("RGB"), 3) => {}
        (tupltype, depth) => {
            return Err(anyhow!(
                "Unsupported PAM tuple type {:?} with depth {}",
                tupltype,
                depth
            ))
        }
    }

    let data = raster(bytes, pos, [width, height, depth], "PAM")?;
    let rgba = if depth == 4 {
        data.to_vec()
    } else {
        data.chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect()
    };
    Ok((width, height, rgba))
}
