pub mod db;
pub mod drafts;
pub mod generation_llm;
pub mod geocoder;
pub mod identity;
pub mod media;

pub use db::DbAdapter;
pub use drafts::DraftVault;
pub use generation_llm::OpenAiGenerationAdapter;
pub use geocoder::NominatimGeocoder;
pub use identity::PgIdentityAdapter;
pub use media::RelayMediaPlatform;
