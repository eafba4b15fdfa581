use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{validate_email, validate_name};
use super::{Engine, EngineError, Entity, SharedProfessional};

// Catalog mutations hold `catalog_lock` across commit + apply.
impl Engine {
    pub async fn save_profile(&self, profile: TenantProfile) -> Result<(), EngineError> {
        validate_name("business name", &profile.name)?;
        if profile.name.len() > MAX_TENANT_NAME_LEN {
            return Err(EngineError::LimitExceeded("business name too long"));
        }
        if let Some(email) = &profile.notification_email {
            validate_email(email)?;
        }

        let _catalog = self.catalog_lock.lock().await;
        let event = Event::ProfileSaved {
            profile: profile.clone(),
        };
        self.commit(&event).await?;
        *self.profile.write().await = Some(profile);
        Ok(())
    }

    pub async fn set_hours(&self, weekday: u8, hours: DayHours) -> Result<(), EngineError> {
        if weekday > 6 {
            return Err(EngineError::InvalidInput(format!(
                "weekday must be 0 (Monday) through 6 (Sunday), got {weekday}"
            )));
        }
        let _catalog = self.catalog_lock.lock().await;
        self.commit(&Event::HoursSet { weekday, hours }).await?;
        self.hours.write().await.set(weekday, hours);
        Ok(())
    }

    /// Create or update a professional. Deactivating one that has any
    /// appointment on record is refused.
    pub async fn save_professional(
        &self,
        id: Ulid,
        name: String,
        active: bool,
    ) -> Result<(), EngineError> {
        validate_name("professional name", &name)?;
        let _catalog = self.catalog_lock.lock().await;
        let event = Event::ProfessionalSaved {
            id,
            name: name.clone(),
            active,
        };

        if let Some(ps) = self.get_professional(&id) {
            let mut guard = ps.write().await;
            if guard.active && !active && !guard.appointments.is_empty() {
                return Err(EngineError::HasAppointments(id));
            }
            return self.persist_and_apply(&mut guard, &event).await;
        }

        if self.professionals.len() >= MAX_PROFESSIONALS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many professionals"));
        }
        self.commit(&event).await?;
        let ps: SharedProfessional = Arc::new(RwLock::new(ProfessionalState::new(id, name, active)));
        self.professionals.insert(id, ps);
        info!(tenant = %self.tenant(), professional = %id, "professional created");
        Ok(())
    }

    pub async fn remove_professional(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        let ps = self
            .get_professional(&id)
            .ok_or(EngineError::NotFound(Entity::Professional, id))?;
        let mut guard = ps.write().await;
        if !guard.appointments.is_empty() {
            return Err(EngineError::HasAppointments(id));
        }
        self.commit(&Event::ProfessionalRemoved { id }).await?;
        // A booking already waiting on this lock must see a dead professional.
        guard.active = false;
        drop(guard);
        self.professionals.remove(&id);
        info!(tenant = %self.tenant(), professional = %id, "professional removed");
        Ok(())
    }

    pub async fn save_service(&self, service: Service) -> Result<(), EngineError> {
        validate_name("service name", &service.name)?;
        if service.duration_minutes == 0 {
            return Err(EngineError::InvalidInput("service duration must be positive".into()));
        }
        if service.duration_minutes > MAX_SERVICE_DURATION_MINUTES {
            return Err(EngineError::LimitExceeded("service duration too long"));
        }

        let _catalog = self.catalog_lock.lock().await;
        if !self.services.contains_key(&service.id) && self.services.len() >= MAX_SERVICES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many services"));
        }
        self.commit(&Event::ServiceSaved {
            service: service.clone(),
        })
        .await?;
        self.services.insert(service.id, service);
        Ok(())
    }

    // ── Readers ──────────────────────────────────────────────

    pub async fn profile(&self) -> Option<TenantProfile> {
        self.profile.read().await.clone()
    }

    /// Hours for one weekday. An unconfigured weekday is an error, never an
    /// implicit "open".
    pub async fn hours_for(&self, weekday: u8) -> Result<DayHours, EngineError> {
        self.hours
            .read()
            .await
            .get(weekday)
            .ok_or(EngineError::HoursNotConfigured(weekday))
    }

    pub async fn weekly_hours(&self) -> WeeklyHours {
        self.hours.read().await.clone()
    }

    pub async fn closed_weekdays(&self) -> Vec<u8> {
        self.hours.read().await.closed_weekdays()
    }

    pub fn service(&self, id: Ulid) -> Option<Service> {
        self.services.get(&id).map(|e| e.value().clone())
    }

    pub fn list_services(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        services
    }

    pub async fn list_professionals(&self) -> Vec<ProfessionalInfo> {
        let shared: Vec<SharedProfessional> =
            self.professionals.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(shared.len());
        for ps in shared {
            out.push(ps.read().await.info());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }
}
