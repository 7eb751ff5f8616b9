// Concrete debrid provider clients
//
// One module per backend family, grounded on the shared-client HTTP
// pattern used across the corpus: a lazily-built `reqwest::Client`
// reused by every instance, a thin typed response model, and a module
// boundary isolating the backend's JSON shapes from the
// `mediafusion_core::provider::DebridProvider` contract they implement.

pub mod p2p;
pub mod pikpak;
pub mod realdebrid;
pub mod torbox;
pub mod webdav;

pub use p2p::P2pProvider;
pub use pikpak::PikPakProvider;
pub use realdebrid::RealDebridProvider;
pub use torbox::TorBoxProvider;
pub use webdav::WebDavProvider;
