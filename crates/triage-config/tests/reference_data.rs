//! The shipped body-part data loads and validates.

use std::path::PathBuf;
use triage_config::{ConfigProvider, FileConfigProvider};

fn provider() -> FileConfigProvider {
    FileConfigProvider::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/medical"))
}

#[tokio::test]
async fn test_reference_body_parts_are_listed() {
    let parts = provider().available_body_parts().await.unwrap();
    assert_eq!(parts, vec!["knee", "shoulder"]);
}

#[tokio::test]
async fn test_knee_data() {
    let knee = provider().load("knee").await.unwrap();
    assert_eq!(knee.display_name(), "Knee");
    let order: Vec<&str> = knee.bucket_order().iter().map(|b| b.as_str()).collect();
    assert_eq!(order, vec!["OA", "OVR", "TRM", "INF"]);
    assert!(knee.arbitration_template().is_some());
    assert!(knee.weights_for("_description").is_none());
    assert!(knee.is_known_code("fever_chills"));
    assert_eq!(knee.red_flag_rules().len(), 3);
    for code in ["OA", "OVR", "TRM", "INF"] {
        assert!(knee.bucket_info(code).is_some(), "missing description for {code}");
    }
}

#[tokio::test]
async fn test_shoulder_data() {
    let shoulder = provider().load("shoulder").await.unwrap();
    assert!(shoulder.arbitration_template().is_none());
    assert_eq!(shoulder.bucket_order().len(), 4);
    let infection = shoulder
        .red_flag_rules()
        .iter()
        .find(|r| r.code == "joint_infection")
        .unwrap();
    assert!(infection.required.contains("fever_chills"));
}
