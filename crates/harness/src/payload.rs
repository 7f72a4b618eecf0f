//! Reserve-order request bodies

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub products_id: u64,
    pub country_id: u64,
    pub user_id: u64,
    pub package_type_id: u32,
    pub goods_number: u32,
    pub receive_info: ReceiveInfo,
    pub storehouse_id: u32,
    pub reserve_order_detail_list: Vec<ParcelDetail>,
    pub customs_info_list: Vec<CustomsInfo>,
}

/// Consignee address block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveInfo {
    pub address: String,
    pub province_id: u64,
    pub city_id: u64,
    pub district_id: u64,
    pub province_name: String,
    pub city_name: String,
    pub country_id: u64,
    pub mobile: String,
    pub name: String,
    pub phone_number: String,
    pub zip_code: String,
}

/// Dimensions of one carton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelDetail {
    pub height: u32,
    pub length: u32,
    pub weight: u32,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomsInfo {
    pub amount: u32,
    pub ctns: u32,
    pub hs_code: String,
    pub english_name: String,
    pub shipment_tracking_id: String,
    pub fba_number: String,
    pub remark: String,
    pub material: String,
    pub name: String,
    pub single_weight: u32,
    pub specification: String,
    pub total_value: u32,
    pub unit_price: u32,
    pub unit_type_id: u32,
    pub uses: String,
    pub pic_url: String,
    pub brand: String,
    pub volume: String,
}

impl OrderPayload {
    /// The template every derived order starts from
    pub fn base() -> Self {
        let carton = ParcelDetail {
            height: 40,
            length: 40,
            weight: 12,
            width: 40,
        };

        Self {
            products_id: 97,
            country_id: 233,
            user_id: 8065,
            package_type_id: 1,
            goods_number: 2,
            receive_info: ReceiveInfo {
                address: "9850 Mississippi Street".to_string(),
                province_id: 0,
                city_id: 0,
                district_id: 0,
                province_name: "IN".to_string(),
                city_name: "MERRILLVILLE".to_string(),
                country_id: 233,
                mobile: "000".to_string(),
                name: "ONT8".to_string(),
                phone_number: "000".to_string(),
                zip_code: "46410".to_string(),
            },
            storehouse_id: 1,
            reserve_order_detail_list: vec![carton.clone(), carton],
            customs_info_list: vec![CustomsInfo {
                amount: 48,
                ctns: 2,
                hs_code: "83061000".to_string(),
                english_name: "铃铛".to_string(),
                shipment_tracking_id: String::new(),
                fba_number: String::new(),
                remark: String::new(),
                material: "铁".to_string(),
                name: "铃铛".to_string(),
                single_weight: 12,
                specification: "无".to_string(),
                total_value: 288,
                unit_price: 3,
                unit_type_id: 0,
                uses: "铃铛".to_string(),
                pic_url: "http://tianmubms.oss-cn-shenzhen.aliyuncs.com/1752718461039_GkN1.png"
                    .to_string(),
                brand: "无".to_string(),
                volume: "40*40*40".to_string(),
            }],
        }
    }

    /// Base template with `productsId`, the top-level `countryId` and `userId`
    /// offset by `order_index`. The consignee's `countryId` is left alone.
    pub fn for_index(order_index: u32) -> Self {
        let offset = u64::from(order_index);
        let mut payload = Self::base();
        payload.products_id += offset;
        payload.country_id += offset;
        payload.user_id += offset;
        payload
    }

    pub fn to_json(&self) -> serde_json::Value {
        // A struct of plain fields always serializes
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_index_zero_is_base() {
        assert_eq!(OrderPayload::for_index(0), OrderPayload::base());
    }

    #[test]
    fn test_offset_fields_only() {
        let order = OrderPayload::for_index(5);
        assert_eq!(order.products_id, 102);
        assert_eq!(order.country_id, 238);
        assert_eq!(order.user_id, 8070);
        assert_eq!(order.receive_info.country_id, 233);
        assert_eq!(order.customs_info_list, OrderPayload::base().customs_info_list);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        assert_eq!(OrderPayload::for_index(42), OrderPayload::for_index(42));
    }

    #[test]
    fn test_distinct_indices_never_collide() {
        let mut products = HashSet::new();
        let mut countries = HashSet::new();
        let mut users = HashSet::new();
        for i in 0..256 {
            let order = OrderPayload::for_index(i);
            assert!(products.insert(order.products_id));
            assert!(countries.insert(order.country_id));
            assert!(users.insert(order.user_id));
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = OrderPayload::for_index(1).to_json();
        assert_eq!(json["productsId"], 98);
        assert_eq!(json["receiveInfo"]["zipCode"], "46410");
        assert_eq!(json["reserveOrderDetailList"].as_array().unwrap().len(), 2);
        assert_eq!(json["customsInfoList"][0]["hsCode"], "83061000");
    }
}
