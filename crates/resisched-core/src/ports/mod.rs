//! Repository port traits: the seams `resisched-storage` implements and
//! `resisched-harness`/`resisched-cli` depend on through `dyn Trait`,
//! never a concrete adapter. Every trait is `Send + Sync` and
//! `mockall`-mockable under the `testing` feature, mirroring the
//! teacher's `ContentRepository`/`UserRepository` split.

pub mod assignment_repository;
pub mod context_repository;
pub mod explanation_repository;
pub mod integrity_repository;
pub mod run_repository;

pub use assignment_repository::AssignmentRepository;
pub use context_repository::ContextRepository;
pub use explanation_repository::ExplanationRepository;
pub use integrity_repository::IntegrityRepository;
pub use run_repository::RunRepository;
