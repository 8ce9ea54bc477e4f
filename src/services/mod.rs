pub mod study_generator;

pub use study_generator::{
    GeneratedStudy, ResolvedText, StudyGeneratorService, StudyRequest, TextSource,
};
