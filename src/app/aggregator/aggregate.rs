//! Pure aggregation of station lists and time-series responses

use chrono::{DateTime, Utc};
use tracing::{trace, warn};

use crate::app::models::{FeatureCollection, StationTimeSeries};

/// Build the stations-with-forecasts collection
///
/// Responses are visited in the order given. A response contributes a feature
/// only when it has points strictly after `now` and its `Name` matches a
/// station's `spreadsheetitemid`; everything else is dropped.
pub fn aggregate(
    stations: &FeatureCollection,
    responses: &[StationTimeSeries],
    now: DateTime<Utc>,
) -> FeatureCollection {
    let mut result = FeatureCollection::new();

    for response in responses {
        if response.data.is_empty() {
            continue;
        }

        let points = response.future_points(now);
        if points.is_empty() {
            trace!("No future points for {:?}", response.name);
            continue;
        }

        let Some(station_id) = response.station_id() else {
            warn!("Time series without a usable Name, skipping");
            continue;
        };

        match stations.find_station(&station_id) {
            Some(station) => result
                .features
                .push(station.with_series(points, response.metadata.clone())),
            None => warn!(
                "Time series for {} matches no station in the catchment, skipping",
                station_id
            ),
        }
    }

    result
}
