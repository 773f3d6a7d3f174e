// Copyright 2025 the Gantry Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic compile failure injection.
//!
//! Injected failures are not short-circuited: the compile request is corrupted
//! so the real shader compiler or pipeline linker rejects it, and the failure
//! travels through the same path as a genuine one.

/// Which compile stage a frame forces to fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SynthesizedFailure {
    #[default]
    None,
    /// Every specialized shader fails to compile.
    ShaderCompilation,
    /// The uber shader fails to compile. Specialized shaders are unaffected.
    UbershaderLoad,
    /// Pipeline creation fails after a successful shader compile, for
    /// specialized and uber pipelines alike.
    PipelineCreation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStage {
    Shader,
    Pipeline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineKind {
    Specific,
    Uber,
}

/// Source appended to a shader whose compilation is forced to fail.
const POISONED_SOURCE: &str = "\nfn synthesized_failure( {\n";
/// Entry point requested for a pipeline whose creation is forced to fail.
const POISONED_ENTRY: &str = "synthesized_failure_main";

/// Applies a [`SynthesizedFailure`] to compile requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailureInjector {
    failure: SynthesizedFailure,
}

impl FailureInjector {
    pub fn new(failure: SynthesizedFailure) -> Self {
        Self { failure }
    }

    pub fn failure(self) -> SynthesizedFailure {
        self.failure
    }

    pub fn fails(self, stage: CompileStage, kind: PipelineKind) -> bool {
        use CompileStage::{Pipeline, Shader};
        use PipelineKind::{Specific, Uber};
        matches!(
            (self.failure, stage, kind),
            (SynthesizedFailure::ShaderCompilation, Shader, Specific)
                | (SynthesizedFailure::UbershaderLoad, Shader, Uber)
                | (SynthesizedFailure::PipelineCreation, Pipeline, _)
        )
    }

    /// Corrupt `source` if shader compilation of `kind` is forced to fail.
    pub fn shader_source(self, kind: PipelineKind, mut source: String) -> String {
        if self.fails(CompileStage::Shader, kind) {
            log::debug!("injecting {:?} into {kind:?} shader source", self.failure);
            source.push_str(POISONED_SOURCE);
        }
        source
    }

    /// The fragment entry point to link, replaced by one the module does not
    /// declare if pipeline creation of `kind` is forced to fail.
    pub fn fragment_entry(self, kind: PipelineKind) -> &'static str {
        if self.fails(CompileStage::Pipeline, kind) {
            log::debug!("injecting {:?} into {kind:?} pipeline link", self.failure);
            POISONED_ENTRY
        } else {
            gantry_shaders::FRAGMENT_ENTRY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SynthesizedFailure; 4] = [
        SynthesizedFailure::None,
        SynthesizedFailure::ShaderCompilation,
        SynthesizedFailure::UbershaderLoad,
        SynthesizedFailure::PipelineCreation,
    ];

    #[test]
    fn failure_matrix() {
        use CompileStage::*;
        use PipelineKind::*;
        let table = |failure| {
            let injector = FailureInjector::new(failure);
            [
                injector.fails(Shader, Specific),
                injector.fails(Shader, Uber),
                injector.fails(Pipeline, Specific),
                injector.fails(Pipeline, Uber),
            ]
        };
        assert_eq!(table(ALL[0]), [false, false, false, false]);
        assert_eq!(table(ALL[1]), [true, false, false, false]);
        assert_eq!(table(ALL[2]), [false, true, false, false]);
        assert_eq!(table(ALL[3]), [false, false, true, true]);
    }

    #[test]
    fn injection_is_repeatable() {
        for failure in ALL {
            let injector = FailureInjector::new(failure);
            for kind in [PipelineKind::Specific, PipelineKind::Uber] {
                let first = injector.shader_source(kind, "x".into());
                let second = injector.shader_source(kind, "x".into());
                assert_eq!(first, second);
                assert_eq!(injector.fragment_entry(kind), injector.fragment_entry(kind));
            }
        }
    }

    #[test]
    fn poisoned_source_is_rejected_by_the_compiler() {
        let source = gantry_shaders::ShaderVariant::uber().source().unwrap();
        let injector = FailureInjector::new(SynthesizedFailure::UbershaderLoad);
        let poisoned = injector.shader_source(PipelineKind::Uber, source.clone());
        assert!(gantry_shaders::compile("poisoned", &poisoned).is_err());
        let untouched = injector.shader_source(PipelineKind::Specific, source);
        assert!(gantry_shaders::compile("untouched", &untouched).is_ok());
    }
}
