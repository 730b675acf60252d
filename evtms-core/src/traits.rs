use crate::imports::*;

/// Serialization formats understood by [`SerdeAPI`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerdeFormat {
    Yaml,
    Json,
    Csv,
}

impl SerdeFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Parses a format name or file extension (leading dot and case ignored),
    /// rejecting anything not listed in `accepted`
    pub fn parse(format: &str, accepted: &[&str]) -> anyhow::Result<Self> {
        let parsed = match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => Self::Yaml,
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => bail!("Unsupported format {format:?}, must be one of {accepted:?}"),
        };
        ensure!(
            accepted.contains(&parsed.name()),
            "Format {format:?} is not available for this type, must be one of {accepted:?}"
        );
        Ok(parsed)
    }

    /// Format implied by the extension of `filepath`
    pub fn from_path(filepath: &Path, accepted: &[&str]) -> anyhow::Result<Self> {
        let extension = filepath
            .extension()
            .and_then(OsStr::to_str)
            .with_context(|| format!("File extension could not be parsed: {filepath:?}"))?;
        Self::parse(extension, accepted)
    }
}

/// File and string (de)serialization.  Every deserializing method runs
/// [`SerdeAPI::init`] on the result before handing it back.
pub trait SerdeAPI: Serialize + for<'a> Deserialize<'a> {
    const ACCEPTED_BYTE_FORMATS: &'static [&'static str] = &["yaml", "json"];
    const ACCEPTED_STR_FORMATS: &'static [&'static str] = &["yaml", "json"];

    /// Validation and any other setup needed after deserialization
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Writes to `filepath` in the format given by its extension, truncating
    /// any existing file
    fn to_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        let format = SerdeFormat::from_path(filepath, Self::ACCEPTED_BYTE_FORMATS)?;
        let file = File::create(filepath)
            .with_context(|| format!("Could not create file: {filepath:?}"))?;
        self.to_writer(file, format.name())
    }

    fn to_writer<W: std::io::Write>(&self, wtr: W, format: &str) -> anyhow::Result<()> {
        match SerdeFormat::parse(format, Self::ACCEPTED_BYTE_FORMATS)? {
            SerdeFormat::Yaml => serde_yaml::to_writer(wtr, self)?,
            SerdeFormat::Json => serde_json::to_writer(wtr, self)?,
            SerdeFormat::Csv => bail!("{}\ncsv writing is not implemented", format_dbg!()),
        }
        Ok(())
    }

    /// Reads from `filepath` in the format given by its extension
    fn from_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let format = SerdeFormat::from_path(filepath, Self::ACCEPTED_BYTE_FORMATS)?;
        let file = File::open(filepath).with_context(|| {
            if filepath.exists() {
                format!("Could not open file: {filepath:?}")
            } else {
                format!("File not found: {filepath:?}")
            }
        })?;
        Self::from_reader(file, format.name())
    }

    fn to_str(&self, format: &str) -> anyhow::Result<String> {
        match SerdeFormat::parse(format, Self::ACCEPTED_STR_FORMATS)? {
            SerdeFormat::Yaml => self.to_yaml(),
            SerdeFormat::Json => self.to_json(),
            SerdeFormat::Csv => bail!("{}\ncsv output is not implemented", format_dbg!()),
        }
    }

    fn from_str<S: AsRef<str>>(contents: S, format: &str) -> anyhow::Result<Self> {
        match SerdeFormat::parse(format, Self::ACCEPTED_STR_FORMATS)? {
            SerdeFormat::Yaml => Self::from_yaml(contents),
            SerdeFormat::Json => Self::from_json(contents),
            SerdeFormat::Csv => bail!("{}\ncsv input is not supported", format_dbg!()),
        }
    }

    fn from_reader<R: std::io::Read>(rdr: R, format: &str) -> anyhow::Result<Self> {
        let mut de: Self = match SerdeFormat::parse(format, Self::ACCEPTED_BYTE_FORMATS)? {
            SerdeFormat::Yaml => serde_yaml::from_reader(rdr)?,
            SerdeFormat::Json => serde_json::from_reader(rdr)?,
            SerdeFormat::Csv => bail!("{}\ncsv input is not supported", format_dbg!()),
        };
        de.init()?;
        Ok(de)
    }

    fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self)?)
    }

    fn from_json<S: AsRef<str>>(json_str: S) -> anyhow::Result<Self> {
        let mut de: Self = serde_json::from_str(json_str.as_ref())?;
        de.init()?;
        Ok(de)
    }

    fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(&self)?)
    }

    fn from_yaml<S: AsRef<str>>(yaml_str: S) -> anyhow::Result<Self> {
        let mut de: Self = serde_yaml::from_str(yaml_str.as_ref())?;
        de.init()?;
        Ok(de)
    }
}

/// Equality within a relative/absolute tolerance, see [`almost_eq`]
pub trait ApproxEq<Rhs = Self> {
    fn approx_eq(&self, other: &Rhs, tol: f64) -> bool;
}

macro_rules! impl_exact_approx_eq {
    ($($ty: ty),*) => {
        $(
            impl ApproxEq for $ty {
                fn approx_eq(&self, other: &$ty, _tol: f64) -> bool {
                    self == other
                }
            }
        )*
    }
}

impl_exact_approx_eq!(u32, usize, i32, bool, String);

impl ApproxEq for f64 {
    fn approx_eq(&self, other: &f64, tol: f64) -> bool {
        almost_eq(*self, *other, Some(tol))
    }
}

fn all_approx_eq<'a, T: ApproxEq + 'a>(
    lhs: impl ExactSizeIterator<Item = &'a T>,
    rhs: impl ExactSizeIterator<Item = &'a T>,
    tol: f64,
) -> bool {
    lhs.len() == rhs.len() && lhs.zip(rhs).all(|(x, y)| x.approx_eq(y, tol))
}

impl<T: ApproxEq> ApproxEq for Vec<T> {
    fn approx_eq(&self, other: &Vec<T>, tol: f64) -> bool {
        all_approx_eq(self.iter(), other.iter(), tol)
    }
}

impl<T: ApproxEq> ApproxEq for Array1<T> {
    fn approx_eq(&self, other: &Array1<T>, tol: f64) -> bool {
        all_approx_eq(self.iter(), other.iter(), tol)
    }
}

impl<T: ApproxEq> ApproxEq for Option<T> {
    fn approx_eq(&self, other: &Option<T>, tol: f64) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.approx_eq(b, tol),
            (a, b) => a.is_none() && b.is_none(),
        }
    }
}
