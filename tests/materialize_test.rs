// test of the materialization engine
use chrono::TimeZone;
use tsblob::blob::numeric::{NumericBlob,NumericEncoder};
use tsblob::blob::text::{TextBlob,TextEncoder};
use tsblob::blob::BlobOptions;
use tsblob::set::{NumericBlobSet,TextBlobSet};

const SECOND: i64 = 1_000_000;
const HOUR: i64 = 3600*SECOND;
const ID: u64 = 12345;

fn t0() -> i64 {
    chrono::Utc.with_ymd_and_hms(2024,1,1,0,0,0).unwrap().timestamp_micros()
}

fn numeric_blob(start: i64,id: u64,values: &[f64],tags: &[&str],opts: BlobOptions) -> NumericBlob {
    let mut enc = NumericEncoder::new(start,opts);
    enc.start_metric_by_id(id,values.len()).expect("start failed");
    for i in 0..values.len() {
        enc.add_point(start + i as i64*SECOND,values[i],tags[i]).expect("add failed");
    }
    enc.end_metric().expect("end failed");
    NumericBlob::decode(&enc.finish().expect("finish failed")).expect("decode failed")
}

#[test]
fn materialize_metric_across_a_set() {
    let t = t0();
    let tagged = BlobOptions { tags_enabled: true, ..Default::default() };
    let a = numeric_blob(t,ID,&[1.0,2.0],&["tag1","tag2"],tagged);
    let b = numeric_blob(t+HOUR,ID,&[3.0,4.0,5.0],&["tag3","tag4","tag5"],tagged);
    let set = NumericBlobSet::new(vec![a,b]);

    let m = set.materialize_metric(ID).expect("metric not found");
    assert_eq!(m.len(),5);
    assert_eq!(m.values,vec![1.0,2.0,3.0,4.0,5.0]);
    assert_eq!(m.tags.len(),5);
    assert_eq!(m.tags[2],"tag3");
    assert_eq!(m.timestamps[2],t+HOUR);
    // O(1) lookups agree with the arrays
    assert_eq!(m.value_at(4),Some(5.0));
    assert_eq!(m.value_at(5),None);
    assert_eq!(m.tag_at(0).as_deref(),Some("tag1"));
    assert_eq!(m.numeric_at(3).map(|p| p.val),Some(4.0));

    assert!(set.materialize_metric(999).is_none());
}

#[test]
fn materialization_equals_iteration() {
    let t = t0();
    let opts = BlobOptions { tags_enabled: true, ..Default::default() };
    let blobs = vec![
        numeric_blob(t+HOUR,ID,&[4.0,5.0],&["d","e"],opts),
        numeric_blob(t,ID,&[1.0,2.0,3.0],&["a","b","c"],opts)
    ];
    let set = NumericBlobSet::new(blobs);
    let m = set.materialize_metric(ID).expect("metric not found");
    let it_ts: Vec<i64> = set.all_timestamps(ID).map(|(_,ts)| ts).collect();
    let it_vals: Vec<f64> = set.all_values(ID).map(|(_,v)| v).collect();
    let it_tags: Vec<String> = set.all_tags(ID).map(|(_,t)| t).collect();
    assert_eq!(m.timestamps,it_ts);
    assert_eq!(m.values,it_vals);
    assert_eq!(m.tags,it_tags);
}

#[test]
fn materialize_whole_blob() {
    let t = t0();
    let mut enc = NumericEncoder::new(t,BlobOptions::default());
    for id in [10u64,20,30] {
        enc.start_metric_by_id(id,2).expect("start failed");
        enc.add_point(t,id as f64,"").expect("add failed");
        enc.add_point(t+SECOND,id as f64 + 0.5,"").expect("add failed");
        enc.end_metric().expect("end failed");
    }
    let blob = NumericBlob::decode(&enc.finish().expect("finish failed")).expect("decode failed");
    let view = blob.materialize();
    assert_eq!(view.metric_count(),3);
    assert_eq!(view.metric_ids(),vec![10,20,30]);
    assert_eq!(view.value_at(20,1),Some(20.5));
    assert_eq!(view.timestamp_at(30,0),Some(t));
    // tags were disabled: empty array, empty string for in-range lookups
    let m = view.metric(10).expect("metric not found");
    assert!(m.tags.is_empty());
    assert_eq!(m.tag_at(1).as_deref(),Some(""));
    assert_eq!(m.tag_at(2),None);
}

#[test]
fn mixed_tag_enablement_across_contributors() {
    let t = t0();
    let tagged = BlobOptions { tags_enabled: true, ..Default::default() };
    let plain = numeric_blob(t,ID,&[1.0,2.0],&["",""],BlobOptions::default());
    let with_tags = numeric_blob(t+HOUR,ID,&[3.0],&["tagged"],tagged);
    let set = NumericBlobSet::new(vec![plain,with_tags]);
    let m = set.materialize_metric(ID).expect("metric not found");
    // one contributor has tags, so the array is full length and aligned
    assert_eq!(m.tags,vec!["","","tagged"]);
    assert_eq!(m.values,vec![1.0,2.0,3.0]);
}

#[test]
fn materialize_set_unions_metrics_and_names() {
    let t = t0();
    let mut enc = NumericEncoder::new(t,BlobOptions::default());
    enc.start_metric_by_name("disk.reads",1).expect("start failed");
    enc.add_point(t,1.0,"").expect("add failed");
    enc.end_metric().expect("end failed");
    let a = NumericBlob::decode(&enc.finish().expect("finish failed")).expect("decode failed");

    let mut enc = NumericEncoder::new(t+HOUR,BlobOptions::default());
    enc.start_metric_by_name("disk.writes",1).expect("start failed");
    enc.add_point(t+HOUR,2.0,"").expect("add failed");
    enc.end_metric().expect("end failed");
    enc.start_metric_by_name("disk.reads",1).expect("start failed");
    enc.add_point(t+HOUR,3.0,"").expect("add failed");
    enc.end_metric().expect("end failed");
    let b = NumericBlob::decode(&enc.finish().expect("finish failed")).expect("decode failed");

    let set = NumericBlobSet::new(vec![a,b]);
    let view = set.materialize();
    assert_eq!(view.metric_count(),2);
    assert!(view.has_metric_name("disk.reads"));
    assert!(view.has_metric_name("disk.writes"));
    let reads = view.metric_by_name("disk.reads").expect("metric not found");
    assert_eq!(reads.values,vec![1.0,3.0]);
    assert_eq!(view.value_at_by_name("disk.writes",0),Some(2.0));
}

#[test]
fn materialize_text() {
    let t = t0();
    let opts = BlobOptions { tags_enabled: true, ..Default::default() };
    let mut enc = TextEncoder::new(t,opts);
    enc.start_metric_by_id(8,2).expect("start failed");
    enc.add_point(t,"on","boot").expect("add failed");
    enc.add_point(t+SECOND,"off","halt").expect("add failed");
    enc.end_metric().expect("end failed");
    let a = TextBlob::decode(&enc.finish().expect("finish failed")).expect("decode failed");

    let mut enc = TextEncoder::new(t+HOUR,opts);
    enc.start_metric_by_id(8,1).expect("start failed");
    enc.add_point(t+HOUR,"on","reboot").expect("add failed");
    enc.end_metric().expect("end failed");
    let b = TextBlob::decode(&enc.finish().expect("finish failed")).expect("decode failed");

    let set = TextBlobSet::new(vec![a,b]);
    let m = set.materialize_metric(8).expect("metric not found");
    assert_eq!(m.values,vec!["on","off","on"]);
    assert_eq!(m.tags,vec!["boot","halt","reboot"]);
    assert_eq!(m.text_at(2).map(|p| p.tag),Some("reboot".to_string()));

    let view = set.materialize();
    assert_eq!(view.metric_count(),1);
    assert_eq!(view.text_value_at(8,1).as_deref(),Some("off"));
    assert_eq!(view.text_at(8,3),None);

    // per-blob materialize matches the blob's own iteration
    let solo = set.blobs()[0].materialize();
    assert_eq!(solo.len(8),2);
    assert_eq!(solo.tag_at(8,0).as_deref(),Some("boot"));
}

#[test]
fn per_blob_materialize_metric() {
    let t = t0();
    let blob = numeric_blob(t,ID,&[9.0,8.0],&["",""],BlobOptions::default());
    let m = blob.materialize_metric(ID).expect("metric not found");
    assert_eq!(m.values,vec![9.0,8.0]);
    assert!(blob.materialize_metric(404).is_none());
}
