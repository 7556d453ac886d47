use std::sync::Arc;
use tally_chain::{encode_transfer, ChainTransaction, MockChainClient};
use tally_dispute::{DisputeError, DisputeOutcome};
use tally_node::config::NodeConfig;
use tally_node::{AttestationSubmission, FeedbackSubmission, NodeError, TallyNode, TaskStatus};
use tally_types::{Address, AgentId, RejectReason, TokenAmount, TxHash};

const STABLECOIN: [u8; 20] = [0xC0; 20];
const REQUESTER: [u8; 20] = [0xAA; 20];
const AGENT_WALLET: [u8; 20] = [0xBB; 20];

fn test_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.chain.stablecoin = Address::from_bytes(STABLECOIN);
    config.dispute.quorum_votes = 3;
    config.dispute.slash_amount = 500_000;
    config
}

fn payment_tx(hash_byte: u8, amount: u128) -> ChainTransaction {
    ChainTransaction {
        hash: TxHash::from_bytes([hash_byte; 32]),
        from: Address::from_bytes(REQUESTER),
        to: Some(Address::from_bytes(STABLECOIN)),
        value: TokenAmount::ZERO,
        input: encode_transfer(
            &Address::from_bytes(AGENT_WALLET),
            TokenAmount::from_base_units(amount),
        ),
        block_number: Some(42),
    }
}

async fn node_with_agent() -> (Arc<TallyNode>, Arc<MockChainClient>, AgentId) {
    let chain = Arc::new(MockChainClient::new());
    let node = Arc::new(TallyNode::with_chain(test_config(), chain.clone()).unwrap());

    let agent_id = AgentId::new("agent-1").unwrap();
    node.register_agent(tally_directory::AgentRegistration {
        id: agent_id.clone(),
        display_name: "Summarizer".into(),
        wallet: Some(Address::from_bytes(AGENT_WALLET)),
        endpoint: None,
        price_per_request: Some(TokenAmount::from_base_units(20_000)),
    })
    .await
    .unwrap();
    node.directory
        .record_stake(&agent_id, TokenAmount::from_base_units(1_000_000))
        .await
        .unwrap();

    (node, chain, agent_id)
}

fn validator(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

#[tokio::test]
async fn test_full_settlement_and_dispute_flow() {
    let (node, chain, agent_id) = node_with_agent().await;
    chain.add_settled(payment_tx(1, 20_000)).await;

    // Route a task to the agent; the resolver supplies wallet and price.
    let wallet = node.resolve_wallet(Some(&agent_id)).await.unwrap();
    assert_eq!(wallet, Address::from_bytes(AGENT_WALLET));
    let price = node.resolve_price(Some(&agent_id)).await.unwrap();
    assert_eq!(price, TokenAmount::from_base_units(20_000));

    let task = node
        .create_task(None, "summarize the filing".into(), agent_id.clone())
        .await
        .unwrap();

    // Settle the payment, twice: the replay hits the idempotent path.
    let tx = TxHash::from_bytes([1; 32]);
    let verdict = node
        .verify_payment(tx, Address::from_bytes(REQUESTER), price, Some(&agent_id))
        .await
        .unwrap();
    assert!(verdict.accepted);

    let replay = node
        .verify_payment(tx, Address::from_bytes(REQUESTER), price, Some(&agent_id))
        .await
        .unwrap();
    assert!(replay.accepted);
    assert_eq!(node.stats().await.unwrap().payments, 1);

    node.complete_task(&task.id, Some(tx)).await.unwrap();

    // Feedback authorized by the settled payment. The resubmit deduplicates.
    let receipt = node
        .submit_feedback(FeedbackSubmission {
            agent_id: agent_id.clone(),
            task_id: task.id.clone(),
            score: 5,
            comment: Some("solid work".into()),
            payment_tx: tx,
        })
        .await
        .unwrap();
    assert!(receipt.accepted && receipt.applied);

    let resubmit = node
        .submit_feedback(FeedbackSubmission {
            agent_id: agent_id.clone(),
            task_id: task.id.clone(),
            score: 5,
            comment: None,
            payment_tx: tx,
        })
        .await
        .unwrap();
    assert!(resubmit.accepted && !resubmit.applied);
    assert_eq!(receipt.score, resubmit.score);

    let score_after_feedback = node.reputation_score(&agent_id).await;
    let cached = node.get_agent(&agent_id).await.unwrap().reputation;
    assert!((cached - score_after_feedback).abs() < 1e-12);

    // The requester contests anyway; validators side against a refund... and
    // then for one, which is not enough.
    let dispute = node
        .raise_dispute(
            task.id.clone(),
            "output was incomplete".into(),
            Address::from_bytes(REQUESTER),
        )
        .await
        .unwrap();
    assert_eq!(
        node.get_task(&task.id).await.unwrap().status,
        TaskStatus::Disputed
    );

    node.vote_on_dispute(&dispute.id, validator(1), false, None)
        .await
        .unwrap();
    node.vote_on_dispute(&dispute.id, validator(2), false, None)
        .await
        .unwrap();
    let outcome = node
        .vote_on_dispute(&dispute.id, validator(3), true, None)
        .await
        .unwrap();

    let resolution = outcome.resolution.expect("third vote reaches quorum");
    assert_eq!(resolution.outcome, DisputeOutcome::Slash);

    // Terminal effects: stake slashed once, task closed, score penalized.
    let record = node.get_agent(&agent_id).await.unwrap();
    assert_eq!(record.staked, TokenAmount::from_base_units(500_000));
    assert_eq!(record.slashed_total, TokenAmount::from_base_units(500_000));
    assert_eq!(
        node.get_task(&task.id).await.unwrap().status,
        TaskStatus::Completed
    );

    let score_after_dispute = node.reputation_score(&agent_id).await;
    assert!((score_after_feedback - score_after_dispute - 0.5).abs() < 1e-9);

    // The dispute is closed to further votes.
    let err = node
        .vote_on_dispute(&dispute.id, validator(4), true, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NodeError::Dispute(DisputeError::AlreadyResolved(_))
    ));
}

#[tokio::test]
async fn test_forged_payer_rejected_without_settlement() {
    let (node, chain, agent_id) = node_with_agent().await;
    chain.add_settled(payment_tx(1, 20_000)).await;

    let verdict = node
        .verify_payment(
            TxHash::from_bytes([1; 32]),
            Address::from_bytes([0xDD; 20]),
            TokenAmount::from_base_units(20_000),
            Some(&agent_id),
        )
        .await
        .unwrap();

    assert!(!verdict.accepted);
    assert_eq!(verdict.reason, Some(RejectReason::SenderMismatch));
    assert_eq!(node.stats().await.unwrap().payments, 0);
}

#[tokio::test]
async fn test_feedback_requires_settled_payment() {
    let (node, _chain, agent_id) = node_with_agent().await;
    let task = node
        .create_task(None, "summarize".into(), agent_id.clone())
        .await
        .unwrap();

    let err = node
        .submit_feedback(FeedbackSubmission {
            agent_id,
            task_id: task.id,
            score: 5,
            comment: None,
            payment_tx: TxHash::from_bytes([9; 32]),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, NodeError::UnknownPayment(_)));
}

#[tokio::test]
async fn test_attestations_feed_reputation() {
    let (node, _chain, agent_id) = node_with_agent().await;
    let task = node
        .create_task(None, "summarize".into(), agent_id.clone())
        .await
        .unwrap();

    let baseline = node.reputation_score(&agent_id).await;

    let receipt = node
        .submit_attestation(AttestationSubmission {
            agent_id: agent_id.clone(),
            task_id: task.id.clone(),
            validator: validator(1),
            passed: false,
        })
        .await
        .unwrap();
    assert!(receipt.applied);
    assert!(receipt.score < baseline);

    // Same validator attesting the same task again deduplicates.
    let replay = node
        .submit_attestation(AttestationSubmission {
            agent_id: agent_id.clone(),
            task_id: task.id,
            validator: validator(1),
            passed: true,
        })
        .await
        .unwrap();
    assert!(!replay.applied);
    assert_eq!(replay.score, receipt.score);
    assert_eq!(
        node.get_agent(&agent_id).await.unwrap().reputation,
        receipt.score
    );
}

#[tokio::test]
async fn test_inactive_agent_cannot_take_tasks_or_payments() {
    let (node, chain, agent_id) = node_with_agent().await;
    chain.add_settled(payment_tx(1, 20_000)).await;
    node.directory.set_active(&agent_id, false).await.unwrap();

    let err = node.resolve_wallet(Some(&agent_id)).await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::Directory(tally_directory::DirectoryError::Inactive(_))
    ));

    let err = node
        .create_task(None, "summarize".into(), agent_id.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NodeError::Directory(tally_directory::DirectoryError::Inactive(_))
    ));

    // A claim naming the inactive agent cannot settle either.
    let err = node
        .verify_payment(
            TxHash::from_bytes([1; 32]),
            Address::from_bytes(REQUESTER),
            TokenAmount::from_base_units(20_000),
            Some(&agent_id),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NodeError::Directory(tally_directory::DirectoryError::Inactive(_))
    ));
}

#[tokio::test]
async fn test_concurrent_settlement_converges_to_one_record() {
    let (node, chain, _agent_id) = node_with_agent().await;
    chain.add_settled(payment_tx(1, 20_000)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let node = node.clone();
        handles.push(tokio::spawn(async move {
            node.verify_payment(
                TxHash::from_bytes([1; 32]),
                Address::from_bytes(REQUESTER),
                TokenAmount::from_base_units(20_000),
                None,
            )
            .await
            .unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().accepted);
    }
    assert_eq!(node.stats().await.unwrap().payments, 1);
}

#[tokio::test]
async fn test_tie_vote_favors_refund_and_keeps_stake() {
    let chain = Arc::new(MockChainClient::new());
    let agent_id = AgentId::new("agent-1").unwrap();

    let mut config = test_config();
    config.dispute.quorum_votes = 2;
    let node = Arc::new(TallyNode::with_chain(config, chain).unwrap());
    node.register_agent(tally_directory::AgentRegistration {
        id: agent_id.clone(),
        display_name: "Summarizer".into(),
        wallet: Some(Address::from_bytes(AGENT_WALLET)),
        endpoint: None,
        price_per_request: None,
    })
    .await
    .unwrap();
    node.directory
        .record_stake(&agent_id, TokenAmount::from_base_units(1_000_000))
        .await
        .unwrap();

    let task = node
        .create_task(None, "summarize".into(), agent_id.clone())
        .await
        .unwrap();
    let dispute = node
        .raise_dispute(task.id, "late delivery".into(), Address::from_bytes(REQUESTER))
        .await
        .unwrap();

    node.vote_on_dispute(&dispute.id, validator(1), true, None)
        .await
        .unwrap();
    let outcome = node
        .vote_on_dispute(&dispute.id, validator(2), false, None)
        .await
        .unwrap();

    assert_eq!(
        outcome.resolution.unwrap().outcome,
        DisputeOutcome::Refund
    );
    let record = node.get_agent(&agent_id).await.unwrap();
    assert_eq!(record.staked, TokenAmount::from_base_units(1_000_000));
    assert_eq!(record.slashed_total, TokenAmount::ZERO);
}
