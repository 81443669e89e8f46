//! Replay a short browsing session and print the emitted events

fn main() {
    let ndjson = r#"
{"signal":"attach","observer":"home-logger","route_name":"Home","route_key":"Home-r1"}
{"signal":"attach","observer":"home-feed","route_name":"Home","route_key":"Home-r1"}
{"signal":"collection_mount","collection_id":"home-feed","observer":"home-feed","source_type":"delivery"}
{"signal":"focus_gained","observer":"home-feed"}
{"signal":"focus_gained","observer":"home-logger"}
{"signal":"visible_items_changed","collection_id":"home-feed","items":[{"contentId":"sku-1","insertionId":"ins-1","indexPath":[0]},{"contentId":"sku-2","insertionId":"ins-2","indexPath":[1]}]}
{"signal":"visible_items_changed","collection_id":"home-feed","items":[{"contentId":"sku-2","insertionId":"ins-2","indexPath":[1]},{"contentId":"sku-3","insertionId":"ins-3","indexPath":[2]}]}
{"signal":"item_tapped","collection_id":"home-feed","item":{"contentId":"sku-2"}}
{"signal":"focus_lost","observer":"home-logger"}
{"signal":"focus_lost","observer":"home-feed"}
{"signal":"attach","observer":"detail-logger","route_name":"Detail","route_key":"Detail-r2"}
{"signal":"focus_gained","observer":"detail-logger"}
{"signal":"action","observer":"detail-logger","action_type":"add_to_cart","content":{"content_id":"sku-2"}}
{"signal":"detach","observer":"detail-logger"}
{"signal":"focus_gained","observer":"home-logger"}
{"signal":"focus_gained","observer":"home-feed"}
{"signal":"collection_unmount","collection_id":"home-feed"}
"#;

    let config = engagement_metrics::TrackerConfig {
        id_prefix: Some("demo".to_string()),
        ..Default::default()
    };

    match engagement_metrics::replay_signals(ndjson, config) {
        Ok(events) => {
            for event in events {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("Error: {e:?}"),
                }
            }
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
