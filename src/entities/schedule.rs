// 📅 CourseSchedule + DeliveryDate
//
// A schedule spans [start_date, end_date]; its delivery dates must lie in
// that range and fall on distinct calendar days. Both rules live in the
// store's triggers, so a violation only surfaces when the schedule is
// written.

use crate::error::Result;
use crate::serializer::{Entity, Reader, ReaderExt, Serializable, Writer, WriterExt};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// DELIVERY DATE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryDate {
    id: Option<i64>,
    delivery_date: DateTime<Utc>,
}

impl DeliveryDate {
    pub fn new(delivery_date: DateTime<Utc>) -> Self {
        DeliveryDate {
            id: None,
            delivery_date,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.delivery_date
    }

    pub fn set_date(&mut self, delivery_date: DateTime<Utc>) {
        self.delivery_date = delivery_date;
    }
}

impl Serializable for DeliveryDate {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        if let Some(date) = reader.read_date_time("deliveryDate")? {
            self.delivery_date = date;
        }
        Ok(())
    }

    fn write_to(&mut self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_date_time("deliveryDate", Some(self.delivery_date))
    }
}

impl Entity for DeliveryDate {
    const TYPE_NAME: &'static str = "DeliveryDate";
    const TABLE: &'static str = "delivery_dates";
    const ORDER_BY: &'static str = "deliveryDate";

    fn with_id(id: i64) -> Self {
        DeliveryDate {
            id: Some(id),
            ..Default::default()
        }
    }
}

// ============================================================================
// COURSE SCHEDULE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseSchedule {
    id: Option<i64>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    delivery_dates: Vec<DeliveryDate>,
}

impl CourseSchedule {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        CourseSchedule {
            start_date,
            end_date,
            ..Default::default()
        }
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    pub fn set_start_date(&mut self, start_date: DateTime<Utc>) {
        self.start_date = start_date;
    }

    pub fn set_end_date(&mut self, end_date: DateTime<Utc>) {
        self.end_date = end_date;
    }

    /// Delivery dates, ascending after a read
    pub fn delivery_dates(&self) -> &[DeliveryDate] {
        &self.delivery_dates
    }

    pub fn add_delivery_date(&mut self, date: DateTime<Utc>) {
        self.delivery_dates.push(DeliveryDate::new(date));
    }

    /// Drop the delivery date with this id. Returns false if there is none.
    ///
    /// Only the in-memory list changes; the stored row goes away once the
    /// schedule is saved through `CourseManager::save_schedule`.
    pub fn remove_delivery_date(&mut self, id: i64) -> bool {
        let before = self.delivery_dates.len();
        self.delivery_dates.retain(|d| d.id() != Some(id));
        self.delivery_dates.len() != before
    }

    pub fn sort_delivery_dates(&mut self) {
        self.delivery_dates.sort_by_key(|d| d.date());
    }
}

impl Serializable for CourseSchedule {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        // NULL keeps the current value
        if let Some(start) = reader.read_date_time("startDate")? {
            self.start_date = start;
        }
        if let Some(end) = reader.read_date_time("endDate")? {
            self.end_date = end;
        }
        self.delivery_dates = reader.read_children("scheduleId")?;
        Ok(())
    }

    fn write_to(&mut self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_date_time("startDate", Some(self.start_date))?;
        writer.write_date_time("endDate", Some(self.end_date))?;
        writer.write_children("scheduleId", &mut self.delivery_dates)
    }
}

impl Entity for CourseSchedule {
    const TYPE_NAME: &'static str = "CourseSchedule";
    const TABLE: &'static str = "schedules";

    fn with_id(id: i64) -> Self {
        CourseSchedule {
            id: Some(id),
            ..Default::default()
        }
    }
}
