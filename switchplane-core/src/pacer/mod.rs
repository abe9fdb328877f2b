mod tx_pacer;

pub use tx_pacer::{PacerConnection, TxPacer, PACER_BURSTS_PER_RTT, PACER_MAX_BURST, PACER_MIN_BURST};
