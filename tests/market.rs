//! Two market nodes talking over loopback UDP.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use market_protocol::{
    decode_follow_records,
    rpc::CallOutcome,
    store::{MemoryContentStore, MemoryProfileStore},
    Id, Listing, Listings, MarketNode, Node, Profile, RpcResult, UserMetadata,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Vendor {
    node: MarketNode,
    content: Arc<MemoryContentStore>,
    profiles: Arc<MemoryProfileStore>,
}

fn vendor() -> Vendor {
    let content = Arc::new(MemoryContentStore::new());
    let profiles = Arc::new(MemoryProfileStore::new());

    let node = MarketNode::builder()
        .port(0)
        .request_timeout(Duration::from_millis(500))
        .content_store(content.clone())
        .profile_store(profiles.clone())
        .build()
        .unwrap();

    Vendor {
        node,
        content,
        profiles,
    }
}

fn buyer() -> MarketNode {
    MarketNode::builder()
        .port(0)
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

fn answered(outcome: CallOutcome) -> RpcResult {
    match outcome {
        CallOutcome::Answered(result) => result,
        CallOutcome::Unanswered => panic!("expected an answer"),
    }
}

#[test]
fn signed_profile_and_metadata() {
    init_tracing();

    let vendor = vendor();
    let buyer = buyer();
    let target = vendor.node.contact();

    // Nothing published yet.
    let result = answered(buyer.caller().call_get_profile(&target).wait());
    assert_eq!(result, RpcResult::NotFound);

    let profile = Profile {
        name: "Alice".to_string(),
        handle: "@alice".to_string(),
        about: "Handmade furniture".to_string(),
        vendor: true,
        country_code: "NL".to_string(),
        ..Default::default()
    };
    vendor.profiles.set_profile(profile.clone());

    let result = answered(buyer.caller().call_get_profile(&target).wait());
    assert!(result.verify(&vendor.node.public_key()));
    assert!(!result.verify(&buyer.public_key()));
    assert_eq!(
        Profile::from_bytes(result.payload().unwrap()).unwrap(),
        profile
    );

    let result = answered(buyer.caller().call_get_user_metadata(&target).wait());
    assert!(result.verify(&vendor.node.public_key()));
    assert_eq!(
        UserMetadata::from_bytes(result.payload().unwrap()).unwrap(),
        UserMetadata::from(&profile)
    );

    // Both sides learned about each other.
    assert!(buyer.router().contains(&vendor.node.id()));
    assert!(vendor.node.router().contains(&buyer.id()));

    vendor.node.shutdown().unwrap();
    buyer.shutdown().unwrap();
}

#[test]
fn content_and_listings() {
    init_tracing();

    let vendor = vendor();
    let buyer = buyer();
    let target = vendor.node.contact();

    let contract = b"{\"vendor_offer\": {\"listing\": \"chair\"}}".to_vec();
    let mut image = vec![0x89, b'P', b'N', b'G'];
    image.extend((0..8000).map(|i| (i % 256) as u8));
    let contract_hash = vendor.content.put_blob(contract.clone());
    let image_hash = vendor.content.put_blob(image.clone());

    let result = answered(
        buyer
            .caller()
            .call_get_contract(&target, &contract_hash)
            .wait(),
    );
    assert_eq!(result, RpcResult::Ok(contract.into()));

    let result = answered(buyer.caller().call_get_image(&target, &image_hash).wait());
    assert_eq!(result, RpcResult::Ok(image.into()));

    let result = answered(
        buyer
            .caller()
            .call_get_image(&target, &Id::hash(b"missing"))
            .wait(),
    );
    assert_eq!(result, RpcResult::NotFound);

    let mut listing = Listing::new(contract_hash, "Oak chair", 12_500, "EUR");
    listing.country_code = "BE".to_string();
    let listings = Listings {
        listing: vec![listing],
    };
    vendor.content.set_listings(&listings).unwrap();
    vendor.profiles.set_profile(Profile {
        name: "Alice".to_string(),
        handle: "@alice".to_string(),
        country_code: "NL".to_string(),
        ..Default::default()
    });

    let result = answered(buyer.caller().call_get_listings(&target).wait());
    assert!(result.verify(&vendor.node.public_key()));
    assert_eq!(
        Listings::from_bytes(result.payload().unwrap()).unwrap(),
        listings
    );

    let result = answered(
        buyer
            .caller()
            .call_get_contract_metadata(&target, &contract_hash)
            .wait(),
    );
    assert!(result.verify(&vendor.node.public_key()));
    let metadata = Listing::from_bytes(result.payload().unwrap()).unwrap();
    assert_eq!(metadata.title, "Oak chair");
    assert_eq!(metadata.country_code, "NL");

    let result = answered(
        buyer
            .caller()
            .call_get_contract_metadata(&target, &image_hash)
            .wait(),
    );
    assert_eq!(result, RpcResult::NotFound);

    vendor.node.shutdown().unwrap();
    buyer.shutdown().unwrap();
}

#[test]
fn follow_and_unfollow() {
    init_tracing();

    let vendor = vendor();
    let buyer = buyer();
    let target = vendor.node.contact();

    let result = answered(buyer.caller().call_get_followers(&target).wait());
    assert_eq!(result, RpcResult::NotFound);

    assert_eq!(
        buyer.follow(&target).unwrap(),
        CallOutcome::Answered(RpcResult::success())
    );

    let result = answered(buyer.caller().call_get_followers(&target).wait());
    let followers = decode_follow_records(result.payload().unwrap()).unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].follower, buyer.id());
    assert_eq!(followers[0].following, vendor.node.id());

    // The vendor can query who the buyer follows.
    let result = answered(
        vendor
            .node
            .caller()
            .call_get_following(&buyer.contact())
            .wait(),
    );
    let following = decode_follow_records(result.payload().unwrap()).unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].following, vendor.node.id());

    // A follow signature can not be replayed as an unfollow.
    let replay = followers[0].signature;
    let result = answered(buyer.caller().call_unfollow(&target, &replay).wait());
    assert_eq!(result, RpcResult::AuthFailed);

    assert_eq!(
        buyer.unfollow(&target).unwrap(),
        CallOutcome::Answered(RpcResult::success())
    );

    let result = answered(buyer.caller().call_get_followers(&target).wait());
    assert_eq!(result, RpcResult::NotFound);

    let result = answered(
        vendor
            .node
            .caller()
            .call_get_following(&buyer.contact())
            .wait(),
    );
    assert_eq!(result, RpcResult::NotFound);

    vendor.node.shutdown().unwrap();
    buyer.shutdown().unwrap();
}

#[test]
fn unanswered_call_removes_contact() {
    init_tracing();

    let buyer = buyer();

    let address = {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap()
    };
    let dead = Node::from_public_key([7; 32], address);

    buyer.router().add_contact(dead.clone());
    assert!(buyer.router().contains(dead.id()));

    let outcome = buyer.caller().call_get_profile(&dead).wait();
    assert_eq!(outcome, CallOutcome::Unanswered);
    assert!(!buyer.router().contains(dead.id()));

    buyer.shutdown().unwrap();
}

#[test]
fn calls_after_shutdown_are_unanswered() {
    let vendor = vendor();
    let buyer = buyer();

    buyer.shutdown().unwrap();
    assert!(buyer.shutdown().is_err());

    let outcome = buyer.caller().call_get_profile(&vendor.node.contact()).wait();
    assert_eq!(outcome, CallOutcome::Unanswered);

    vendor.node.shutdown().unwrap();
}
