mod agent;
mod observation;
mod piece;
mod speech;

pub use agent::{Agent, AgentId, IncomingOffer};
pub use observation::{
    DESIRED_LEN, Normalizer, OFFER_LEN, Observation, OfferSummary, VISION_CELL_LEN, VisionCell,
};
pub use piece::{Piece, PieceId, PieceRegistry, PieceSpec};
pub use speech::{ListenHistory, Speech};
