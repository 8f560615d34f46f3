use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::CounterpartId;
use crate::message::Message;

/// The listing that labels a counterpart's thread, with its last activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredListing {
    pub listing_document_id: String,
    /// Epoch milliseconds of the most recent message under this listing.
    pub last_activity: i64,
}

/// Pick the most recently active listing for every counterpart.
///
/// Messages are visited in input order. Those with an unassignable counterpart
/// or no listing are skipped. A listing replaces the incumbent when its
/// timestamp is greater than *or equal to* the incumbent's, so on exact ties
/// the later message wins. Malformed timestamps count as the epoch.
pub fn compute_preferred_listings<'a, I, F>(
    messages: I,
    counterpart_of: F,
) -> BTreeMap<CounterpartId, PreferredListing>
where
    I: IntoIterator<Item = &'a Message>,
    F: Fn(&Message) -> Option<f64>,
{
    let mut preferred: BTreeMap<CounterpartId, PreferredListing> = BTreeMap::new();

    for message in messages {
        let Some(counterpart) = counterpart_of(message).and_then(CounterpartId::from_raw) else {
            continue;
        };
        let Some(listing) = message.listing() else {
            continue;
        };
        let ts = message.created_at_millis();

        match preferred.get(&counterpart) {
            Some(current) if current.last_activity > ts => {
                // Keep the more recent listing
            }
            _ => {
                preferred.insert(
                    counterpart,
                    PreferredListing {
                        listing_document_id: listing.to_string(),
                        last_activity: ts,
                    },
                );
            }
        }
    }

    preferred
}
