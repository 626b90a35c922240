use crate::input::CreateLotInput;
use parkspot_core::{LifecycleError, LifecycleResult, ParkingStore};
use parkspot_shared::models::ParkingLot;
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const EARTH_RADIUS_KM: f64 = 6371.0088;
const DEFAULT_RADIUS_KM: f64 = 30.0;

/// A search centre and radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// Query-string form of a lot search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LotQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub available_only: bool,
}

impl LotQuery {
    /// The search point, if any. Both coordinates are required together and
    /// a radius needs a point; the radius defaults to 30 km.
    pub fn near(&self) -> LifecycleResult<Option<NearPoint>> {
        match (self.lat, self.lng) {
            (Some(latitude), Some(longitude)) => Ok(Some(NearPoint {
                latitude,
                longitude,
                radius_km: self.radius_km.unwrap_or(DEFAULT_RADIUS_KM),
            })),
            (None, None) if self.radius_km.is_none() => Ok(None),
            (None, None) => Err(LifecycleError::InvalidInput(
                "radius_km requires lat and lng".to_string(),
            )),
            _ => Err(LifecycleError::InvalidInput(
                "Invalid coordinates: lat and lng must be given together".to_string(),
            )),
        }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Merchant lot registration and lot discovery. Never touches slot counters
/// after creation.
pub struct LotCatalog {
    store: Arc<dyn ParkingStore>,
}

impl LotCatalog {
    pub fn new(store: Arc<dyn ParkingStore>) -> Self {
        Self { store }
    }

    pub async fn register_lot(
        &self,
        merchant_id: Uuid,
        input: CreateLotInput,
    ) -> LifecycleResult<ParkingLot> {
        let input = input.validate()?;
        let lot = ParkingLot::new(
            merchant_id,
            input.name,
            input.address,
            input.price_per_hour,
            input.latitude,
            input.longitude,
            input.total_slots,
        );
        self.store.insert_lot(&lot).await?;

        info!(lot_id = %lot.id, merchant_id = %merchant_id, total_slots = lot.total_slots, "Parking lot registered");
        Ok(lot)
    }

    pub async fn lot(&self, lot_id: Uuid) -> LifecycleResult<ParkingLot> {
        self.store
            .get_lot(lot_id)
            .await?
            .ok_or(LifecycleError::LotNotFound(lot_id))
    }

    pub async fn lots_for_merchant(&self, merchant_id: Uuid) -> LifecycleResult<Vec<ParkingLot>> {
        Ok(self.store.list_lots_for_merchant(merchant_id).await?)
    }

    /// Lots matching the query: nearest first for a radius search, by name otherwise.
    pub async fn search(&self, query: &LotQuery) -> LifecycleResult<Vec<ParkingLot>> {
        let near = query.near()?;
        if let Some(point) = near {
            if !(-90.0..=90.0).contains(&point.latitude)
                || !(-180.0..=180.0).contains(&point.longitude)
                || !(point.radius_km > 0.0)
            {
                return Err(LifecycleError::InvalidInput(
                    "lat/lng out of range or non-positive radius_km".to_string(),
                ));
            }
        }

        let lots = self.store.list_lots().await?;
        let mut matches: Vec<(f64, ParkingLot)> = lots
            .into_iter()
            .filter(|lot| !query.available_only || !lot.is_full())
            .filter_map(|lot| match near {
                Some(p) => {
                    let distance = haversine_km(p.latitude, p.longitude, lot.latitude, lot.longitude);
                    (distance <= p.radius_km).then_some((distance, lot))
                }
                None => Some((0.0, lot)),
            })
            .collect();

        matches.sort_by(|(da, a), (db, b)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(matches.into_iter().map(|(_, lot)| lot).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkspot_store::InMemoryParkingStore;

    fn lot_input(name: &str, latitude: f64, longitude: f64, total_slots: i32) -> CreateLotInput {
        CreateLotInput {
            name: name.to_string(),
            address: "Somewhere".to_string(),
            price_per_hour: 2500,
            latitude,
            longitude,
            total_slots,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Connaught Place to India Gate, roughly 2.4 km
        let d = haversine_km(28.6315, 77.2167, 28.6129, 77.2295);
        assert!((d - 2.4).abs() < 0.2, "got {}", d);
        assert!(haversine_km(10.0, 10.0, 10.0, 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_register_and_search() {
        let catalog = LotCatalog::new(Arc::new(InMemoryParkingStore::new()));
        let merchant = Uuid::new_v4();

        let near = catalog
            .register_lot(merchant, lot_input("Janpath", 28.6250, 77.2190, 5))
            .await
            .unwrap();
        catalog
            .register_lot(merchant, lot_input("Far Away", 19.0760, 72.8777, 5))
            .await
            .unwrap();
        assert_eq!(near.vacant_slots, 5);
        assert_eq!(near.occupied_slots, 0);

        let query = LotQuery {
            lat: Some(28.6315),
            lng: Some(77.2167),
            radius_km: Some(10.0),
            available_only: false,
        };
        let found = catalog.search(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, near.id);

        let all = catalog.search(&LotQuery::default()).await.unwrap();
        assert_eq!(all.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(), ["Far Away", "Janpath"]);

        assert_eq!(catalog.lots_for_merchant(merchant).await.unwrap().len(), 2);
        assert!(catalog.lots_for_merchant(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[test]
    fn test_half_given_point_is_rejected() {
        let only_lat = LotQuery {
            lat: Some(28.5),
            ..LotQuery::default()
        };
        assert!(matches!(only_lat.near(), Err(LifecycleError::InvalidInput(_))));

        let lng_and_radius = LotQuery {
            lng: Some(77.2),
            radius_km: Some(2.0),
            ..LotQuery::default()
        };
        assert!(matches!(lng_and_radius.near(), Err(LifecycleError::InvalidInput(_))));

        let radius_only = LotQuery {
            radius_km: Some(2.0),
            ..LotQuery::default()
        };
        assert!(matches!(radius_only.near(), Err(LifecycleError::InvalidInput(_))));

        assert_eq!(LotQuery::default().near().unwrap(), None);
    }

    #[test]
    fn test_radius_defaults_to_thirty_km() {
        let query = LotQuery {
            lat: Some(28.6),
            lng: Some(77.2),
            ..LotQuery::default()
        };
        assert_eq!(query.near().unwrap().unwrap().radius_km, 30.0);
    }

    #[tokio::test]
    async fn test_search_rejects_half_given_point() {
        let catalog = LotCatalog::new(Arc::new(InMemoryParkingStore::new()));
        catalog
            .register_lot(Uuid::new_v4(), lot_input("Janpath", 28.6250, 77.2190, 5))
            .await
            .unwrap();

        let query = LotQuery {
            lat: Some(28.5),
            ..LotQuery::default()
        };
        assert!(matches!(
            catalog.search(&query).await,
            Err(LifecycleError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_lot_and_bad_input() {
        let catalog = LotCatalog::new(Arc::new(InMemoryParkingStore::new()));
        let missing = Uuid::new_v4();
        assert!(matches!(
            catalog.lot(missing).await,
            Err(LifecycleError::LotNotFound(id)) if id == missing
        ));
        let result = catalog
            .register_lot(Uuid::new_v4(), lot_input("Zero", 0.0, 0.0, 0))
            .await;
        assert!(matches!(result, Err(LifecycleError::InvalidInput(_))));
    }
}
