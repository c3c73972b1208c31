use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{FilterWhere, WhereNode};
use super::types::{FilterData, FilterOrderInfo, RestQuery};

/// A validated read against one table: columns, predicates, order and range.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_node: Option<WhereNode>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<u32>,
    offset: Option<u32>,
    data: FilterData,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_node: None,
            order_data: vec![],
            limit: None,
            offset: None,
            data: FilterData::default(),
        })
    }

    pub fn from_data(table_name: impl Into<String>, data: FilterData) -> Result<Self, FilterError> {
        let mut filter = Self::new(table_name)?;
        filter.assign(data)?;
        Ok(filter)
    }

    /// Single-row lookup by primary key
    pub fn by_id(table_name: impl Into<String>, id: &str) -> Result<Self, FilterError> {
        let mut data = FilterData::where_eq("id", id);
        data.limit = Some(1);
        Self::from_data(table_name, data)
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select.clone() { self.select(select)?; }
        if let Some(where_clause) = data.where_clause.clone() { self.where_clause(where_clause)?; }
        if let Some(order) = data.order.clone() { self.order(order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        else if let Some(offset) = data.offset {
            return Err(FilterError::InvalidOffset(format!("offset {} given without a limit", offset)));
        }
        self.data = data;
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        Self::validate_select_columns(&columns)?;
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_node = Some(FilterWhere::parse(&conditions)?);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: u32, offset: Option<u32>) -> Result<&mut Self, FilterError> {
        if limit == 0 { return Err(FilterError::InvalidLimit("Limit must be positive".to_string())); }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    /// Cap the page size at the store's configured maximum
    pub fn cap_limit(&mut self, max_limit: Option<u32>) -> &mut Self {
        if let Some(max) = max_limit {
            match self.limit {
                Some(limit) if limit > max => {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
                    self.limit = Some(max);
                }
                None => self.limit = Some(max),
                _ => {}
            }
        }
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn data(&self) -> &FilterData {
        &self.data
    }

    pub fn limit_value(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u32> {
        self.offset
    }

    pub fn to_rest_query(&self) -> RestQuery {
        let mut params = vec![("select".to_string(), self.build_select_clause())];
        if let Some(ref node) = self.where_node {
            params.extend(FilterWhere::generate(node));
        }
        if let Some(order) = FilterOrder::generate(&self.order_data) {
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        RestQuery { params }
    }

    /// Predicate parameters only, for update/delete requests
    pub fn to_where_params(&self) -> Vec<(String, String)> {
        self.where_node.as_ref().map(FilterWhere::generate).unwrap_or_default()
    }

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.where_node.as_ref().map_or(true, |node| FilterWhere::matches(node, row))
    }

    /// Evaluate the whole filter against in-memory rows: where, order, range, columns
    pub fn apply(&self, rows: impl IntoIterator<Item = Map<String, Value>>) -> Vec<Map<String, Value>> {
        let mut selected: Vec<Map<String, Value>> = rows.into_iter().filter(|row| self.matches(row)).collect();
        FilterOrder::sort_rows(&mut selected, &self.order_data);

        let offset = self.offset.unwrap_or(0) as usize;
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| self.project(row))
            .collect()
    }

    fn project(&self, row: Map<String, Value>) -> Map<String, Value> {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            return row;
        }
        row.into_iter().filter(|(k, _)| self.select_columns.contains(k)).collect()
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() { return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())); }
        let starts_ok = name.chars().next().map_or(false, |c| c.is_alphabetic() || c == '_');
        if !starts_ok || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn validate_select_columns(columns: &[String]) -> Result<(), FilterError> {
        for column in columns {
            if column == "*" { continue; }
            if column.is_empty() { return Err(FilterError::InvalidColumn("Column name cannot be empty".to_string())); }
            let starts_ok = column.chars().next().map_or(false, |c| c.is_alphabetic() || c == '_');
            if !starts_ok || !column.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
            }
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.contains(&"*".to_string()) {
            "*".to_string()
        } else {
            self.select_columns.join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_rest_query_in_order() {
        let data: FilterData = serde_json::from_value(json!({
            "select": ["id", "full_name", "status"],
            "where": { "status": "חדש" },
            "order": "created_at desc",
            "limit": 25,
            "offset": 50
        }))
        .unwrap();
        let filter = Filter::from_data("leads", data).unwrap();
        let query = filter.to_rest_query();
        assert_eq!(query.get("select"), Some("id,full_name,status"));
        assert_eq!(query.get("status"), Some("eq.חדש"));
        assert_eq!(query.get("order"), Some("created_at.desc"));
        assert_eq!(query.get("limit"), Some("25"));
        assert_eq!(query.get("offset"), Some("50"));
    }

    #[test]
    fn caps_limit_at_max_page_size() {
        let mut filter = Filter::new("customers").unwrap();
        filter.limit(5000, None).unwrap();
        filter.cap_limit(Some(200));
        assert_eq!(filter.limit_value(), Some(200));

        let mut unbounded = Filter::new("customers").unwrap();
        unbounded.cap_limit(Some(200));
        assert_eq!(unbounded.limit_value(), Some(200));
    }

    #[test]
    fn offset_without_limit_is_rejected() {
        let data = FilterData { offset: Some(20), ..Default::default() };
        let err = Filter::from_data("leads", data).unwrap_err();
        assert!(matches!(err, FilterError::InvalidOffset(_)));
        assert!(crate::error::CrmError::from(err).is_validation());
    }

    #[test]
    fn rejects_bad_table_names() {
        assert!(Filter::new("").is_err());
        assert!(Filter::new("leads;drop").is_err());
        assert!(Filter::new("1leads").is_err());
        assert!(Filter::new("saved_views").is_ok());
    }

    #[test]
    fn applies_range_and_projection_in_memory() {
        let rows: Vec<Map<String, Value>> = (1..=5)
            .map(|n| json!({ "id": n.to_string(), "n": n, "extra": true }).as_object().cloned().unwrap())
            .collect();
        let data: FilterData = serde_json::from_value(json!({
            "select": ["id"], "where": { "n": { "$gt": 1 } }, "order": "n desc", "limit": 2, "offset": 1
        }))
        .unwrap();
        let filter = Filter::from_data("numbers", data).unwrap();
        let out = filter.apply(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({ "id": "4" }).as_object().cloned().unwrap());
        assert_eq!(out[1], json!({ "id": "3" }).as_object().cloned().unwrap());
    }
}
