use derive_more::derive::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum EonNextError {
    #[display("Authentication against E.ON Next failed: {reason}")]
    Authentication { reason: String },

    #[display("E.ON Next returned errors for {operation}: {messages}")]
    GraphQl { operation: String, messages: String },

    #[display("E.ON Next returned no data for {operation}")]
    MissingData { operation: String },
}
