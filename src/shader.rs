/*! GLSL programs and their SPIR-V binaries.
 *
 *  Cases register their sources in a [`SourceCollection`] by name. The runner
 *  compiles the whole collection with a [`ShaderCompiler`] before a case is
 *  instantiated, and the instance looks binaries up by the same name.
 */

use std::{
    collections::BTreeMap,
    io::{self, Cursor, Write as _},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use ash::vk;

use crate::ShaderError;

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Compute,
    RayGeneration,
    AnyHit,
    ClosestHit,
    Miss,
    Intersection,
    Callable,
}

impl ShaderStage {
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            Self::Compute => vk::ShaderStageFlags::COMPUTE,
            Self::RayGeneration => vk::ShaderStageFlags::RAYGEN_KHR,
            Self::AnyHit => vk::ShaderStageFlags::ANY_HIT_KHR,
            Self::ClosestHit => vk::ShaderStageFlags::CLOSEST_HIT_KHR,
            Self::Miss => vk::ShaderStageFlags::MISS_KHR,
            Self::Intersection => vk::ShaderStageFlags::INTERSECTION_KHR,
            Self::Callable => vk::ShaderStageFlags::CALLABLE_KHR,
        }
    }

    /// Stage name as understood by `glslc -fshader-stage`.
    pub fn glslc_name(self) -> &'static str {
        match self {
            Self::Compute => "comp",
            Self::RayGeneration => "rgen",
            Self::AnyHit => "rahit",
            Self::ClosestHit => "rchit",
            Self::Miss => "rmiss",
            Self::Intersection => "rint",
            Self::Callable => "rcall",
        }
    }

    pub fn is_ray_tracing(self) -> bool {
        !matches!(self, Self::Compute)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpirvVersion {
    V1_0,
    V1_3,
    V1_4,
    V1_5,
}

impl SpirvVersion {
    fn glslc_name(self) -> &'static str {
        match self {
            Self::V1_0 => "spv1.0",
            Self::V1_3 => "spv1.3",
            Self::V1_4 => "spv1.4",
            Self::V1_5 => "spv1.5",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderBuildOptions {
    /// `--target-env` Vulkan version, as `(major, minor)`.
    pub vulkan_version: (u32, u32),
    pub spirv_version: SpirvVersion,
}

impl Default for ShaderBuildOptions {
    fn default() -> Self {
        Self {
            vulkan_version: (1, 0),
            spirv_version: SpirvVersion::V1_0,
        }
    }
}

impl ShaderBuildOptions {
    /// Ray tracing shaders need SPIR-V 1.4 on top of Vulkan 1.1.
    pub fn ray_tracing() -> Self {
        Self {
            vulkan_version: (1, 1),
            spirv_version: SpirvVersion::V1_4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GlslSource {
    pub stage: ShaderStage,
    pub source: String,
    pub options: ShaderBuildOptions,
}

impl GlslSource {
    pub fn new(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
            options: ShaderBuildOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ShaderBuildOptions) -> Self {
        self.options = options;
        self
    }
}

/// Named program sources of one case, in registration order.
#[derive(Clone, Debug, Default)]
pub struct SourceCollection {
    sources: Vec<(String, GlslSource)>,
}

impl SourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `name`, replacing an earlier program of the same name.
    pub fn add(&mut self, name: impl Into<String>, source: GlslSource) {
        let name = name.into();
        match self.sources.iter().position(|&(ref n, _)| *n == name) {
            Some(index) => self.sources[index].1 = source,
            None => self.sources.push((name, source)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&GlslSource> {
        self.sources
            .iter()
            .find(|&&(ref n, _)| n == name)
            .map(|&(_, ref source)| source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GlslSource)> + '_ {
        self.sources
            .iter()
            .map(|&(ref name, ref source)| (name.as_str(), source))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Validated SPIR-V words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramBinary {
    stage: ShaderStage,
    words: Vec<u32>,
}

impl ProgramBinary {
    /// Parses a SPIR-V blob of either endianness.
    pub fn from_bytes(name: &str, stage: ShaderStage, bytes: &[u8]) -> Result<Self, ShaderError> {
        let words = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|_| ShaderError::InvalidBinary(name.to_string()))?;
        Self::from_words(name, stage, words)
    }

    pub fn from_words(name: &str, stage: ShaderStage, words: Vec<u32>) -> Result<Self, ShaderError> {
        // Header is five words: magic, version, generator, bound, schema.
        if words.len() < 5 || words[0] != SPIRV_MAGIC {
            return Err(ShaderError::InvalidBinary(name.to_string()));
        }
        Ok(Self { stage, words })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

#[derive(Clone, Debug, Default)]
pub struct BinaryCollection {
    binaries: BTreeMap<String, Arc<ProgramBinary>>,
}

impl BinaryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, binary: ProgramBinary) {
        self.binaries.insert(name.into(), Arc::new(binary));
    }

    pub fn get(&self, name: &str) -> Result<&ProgramBinary, ShaderError> {
        self.binaries
            .get(name)
            .map(|binary| &**binary)
            .ok_or_else(|| ShaderError::Missing(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}

/// Turns GLSL text into SPIR-V.
pub trait ShaderCompiler {
    fn compile(&self, name: &str, source: &GlslSource) -> Result<ProgramBinary, ShaderError>;
}

/// The `glslc` command line compiler from shaderc.
#[derive(Clone, Debug)]
pub struct Glslc {
    path: PathBuf,
}

impl Glslc {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn arguments(source: &GlslSource) -> Vec<String> {
        let (major, minor) = source.options.vulkan_version;
        vec![
            format!("-fshader-stage={}", source.stage.glslc_name()),
            format!("--target-env=vulkan{major}.{minor}"),
            format!("--target-spv={}", source.options.spirv_version.glslc_name()),
            "-o".to_string(),
            "-".to_string(),
            "-".to_string(),
        ]
    }

    fn launch_error(&self, source: io::Error) -> ShaderError {
        ShaderError::Launch {
            compiler: self.path.display().to_string(),
            source: Arc::new(source),
        }
    }
}

impl ShaderCompiler for Glslc {
    fn compile(&self, name: &str, source: &GlslSource) -> Result<ProgramBinary, ShaderError> {
        profiling::scope!("glslc");
        log::debug!("Compiling {} ({:?}) with {}", name, source.stage, self.path.display());

        let mut child = Command::new(&self.path)
            .args(Self::arguments(source))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        // The compiler reads all of its input before writing anything.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.source.as_bytes())
                .map_err(|e| self.launch_error(e))?;
        }
        let output = child.wait_with_output().map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            return Err(ShaderError::Compilation {
                name: name.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !output.stderr.is_empty() {
            log::warn!(
                "{}: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        ProgramBinary::from_bytes(name, source.stage, &output.stdout)
    }
}

/// Compiles every program of `sources`. Stops at the first failure.
pub fn build_programs(
    compiler: &dyn ShaderCompiler,
    sources: &SourceCollection,
) -> Result<BinaryCollection, ShaderError> {
    let mut binaries = BinaryCollection::new();
    for (name, source) in sources.iter() {
        let binary = compiler.compile(name, source)?;
        binaries.insert(name, binary);
    }
    Ok(binaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [u32; 5] = [SPIRV_MAGIC, 0x0001_0400, 0, 1, 0];

    struct Canned;

    impl ShaderCompiler for Canned {
        fn compile(&self, name: &str, source: &GlslSource) -> Result<ProgramBinary, ShaderError> {
            if source.source.contains("syntax error") {
                return Err(ShaderError::Compilation {
                    name: name.to_string(),
                    message: "syntax error".to_string(),
                });
            }
            ProgramBinary::from_words(name, source.stage, HEADER.to_vec())
        }
    }

    #[test]
    fn binary_words_of_either_endianness() {
        let little: Vec<u8> = HEADER.iter().flat_map(|w| w.to_le_bytes()).collect();
        let big: Vec<u8> = HEADER.iter().flat_map(|w| w.to_be_bytes()).collect();
        for bytes in [little, big] {
            let binary = ProgramBinary::from_bytes("p", ShaderStage::Miss, &bytes).unwrap();
            assert_eq!(binary.words(), HEADER);
        }
    }

    #[test]
    fn malformed_binaries_are_rejected() {
        assert!(matches!(
            ProgramBinary::from_bytes("odd", ShaderStage::Miss, &[3, 2, 35, 7, 0, 0]),
            Err(ShaderError::InvalidBinary(_))
        ));
        assert!(matches!(
            ProgramBinary::from_words("short", ShaderStage::Miss, vec![SPIRV_MAGIC]),
            Err(ShaderError::InvalidBinary(_))
        ));
    }

    #[test]
    fn collection_keeps_order_and_replaces() {
        let mut sources = SourceCollection::new();
        sources.add("rgen", GlslSource::new(ShaderStage::RayGeneration, "a"));
        sources.add("miss", GlslSource::new(ShaderStage::Miss, "b"));
        sources.add("rgen", GlslSource::new(ShaderStage::RayGeneration, "c"));

        let names: Vec<_> = sources.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["rgen", "miss"]);
        assert_eq!(sources.get("rgen").unwrap().source, "c");
    }

    #[test]
    fn build_programs_names_binaries() {
        let mut sources = SourceCollection::new();
        sources.add("miss", GlslSource::new(ShaderStage::Miss, "void main() {}"));
        let binaries = build_programs(&Canned, &sources).unwrap();
        assert_eq!(binaries.get("miss").unwrap().stage(), ShaderStage::Miss);
        assert!(matches!(binaries.get("rgen"), Err(ShaderError::Missing(_))));

        sources.add("bad", GlslSource::new(ShaderStage::Miss, "syntax error"));
        assert!(matches!(
            build_programs(&Canned, &sources),
            Err(ShaderError::Compilation { .. })
        ));
    }

    #[test]
    fn glslc_arguments() {
        let source = GlslSource::new(ShaderStage::Intersection, "")
            .with_options(ShaderBuildOptions::ray_tracing());
        assert_eq!(
            Glslc::arguments(&source),
            [
                "-fshader-stage=rint",
                "--target-env=vulkan1.1",
                "--target-spv=spv1.4",
                "-o",
                "-",
                "-"
            ]
        );
    }
}
