//! Identifier newtypes.
//!
//! Every record in the subsystem is keyed by a UUID.  The newtypes keep a
//! report id from being passed where a pack id is expected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new, random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// The incident report that owns an evidence chain.
    ReportId
);
uuid_id!(
    /// The tenant (organisation) a report belongs to.
    TenantId
);
uuid_id!(
    /// One event in a report's evidence chain.
    EventId
);
uuid_id!(
    /// One defense pack request.
    PackId
);
uuid_id!(
    /// One batched Merkle anchor.
    AnchorId
);
