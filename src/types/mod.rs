//! Type definitions for upstream requests and responses

pub mod clip;
pub mod persona;
pub mod request;
pub mod serde_helpers;

pub use clip::{
    AlignedLyricsResponse, AlignedWord, AudioInfo, BillingInfoResponse, CaptchaCheckResponse,
    ClipInfo, ClipMetadata, ClipStatus, ClipsResponse, CreditsInfo, StemKind, StemWav, VoxStem,
    VoxStemResponse, WavFileResponse, WavResult,
};
pub use persona::{
    PersonaDetailResponse, PersonaInfo, PersonaListResponse, PersonaPage, PersonaRecord,
    PersonaResponse,
};
pub use request::{
    CreatePersonaPayload, CreatePersonaRequest, CustomGenerateRequest, ExtendRequest,
    GenerationType, GeneratePayload, GenerationMetadata, PersonaGeneratePayload, StemPayload,
};
