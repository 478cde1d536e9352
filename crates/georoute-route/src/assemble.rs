use georoute_model::{EnrichedHop, RouteEntry};

/// Builds the ordered route from enrichment results.
///
/// Unresolved hops and hops without usable coordinates are dropped, then a
/// hop whose coordinate pair equals the last accepted one is collapsed into it.
pub fn assemble<I>(enriched: I) -> Vec<RouteEntry>
where
    I: IntoIterator<Item = Option<EnrichedHop>>,
{
    let mut route = Vec::new();
    let mut last_coords = String::new();

    for hop in enriched.into_iter().flatten() {
        let Some(coords) = hop.coords.filter(|coords| !coords.is_degenerate()) else {
            tracing::trace!(address = %hop.address, "dropping hop without usable coordinates");
            continue;
        };

        let key = coords.key();
        if key == last_coords {
            tracing::trace!(address = %hop.address, coords = %key, "collapsing hop into previous location");
            continue;
        }

        last_coords = key;
        route.push(RouteEntry {
            address: hop.address,
            name: hop.name,
            coords,
            isp: hop.isp,
            org: hop.org,
            as_number: hop.as_number,
            latency: hop.latency,
        });
    }

    route
}
