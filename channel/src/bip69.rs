use dependencies::bitcoin::{Transaction, TxIn, TxOut};
use dependencies::bitcoin_hashes::Hash;

// Represent reordering of transaction input and outputs
// inputs is a vector of positions of initial transaction inputs
// for example
// inputs = [2, 0, 1] means that in a new transaction inputs:
// 0: 2-nd initial
// 1: 0-th initial
// 2: 1-st initial
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionReordering {
    pub inputs: Vec<u32>,
    pub outputs: Vec<u32>,
}

impl TransactionReordering {
    // Applies reordering to a given transaction
    // Returns true if reordering was successful
    pub fn apply(&self, tx: &mut Transaction) -> bool {
        if !(
            self.is_correct()
            && self.inputs.len() == tx.input.len()
            && self.outputs.len() == tx.output.len()
        ) {
            return false;
        }

        let new_inputs = self.inputs.iter()
            .map(|&x| tx.input[x as usize].clone())
            .collect::<Vec<TxIn>>();
        let new_outputs = self.outputs.iter()
            .map(|&x| tx.output[x as usize].clone())
            .collect::<Vec<TxOut>>();

        tx.input = new_inputs;
        tx.output = new_outputs;
        true
    }

    // Returns if reordering is correct
    // inputs are some permutation of 0..len(inputs)
    // outputs are some permutation of 0..len(outputs)
    pub fn is_correct(&self) -> bool {
        is_permutation(&self.inputs) && is_permutation(&self.outputs)
    }

    /// Position in the reordered transaction of the input which was at
    /// `original` before reordering.
    pub fn new_input_position(&self, original: u32) -> Option<usize> {
        self.inputs.iter().position(|&x| x == original)
    }

    /// Same as `new_input_position` for outputs.
    pub fn new_output_position(&self, original: u32) -> Option<usize> {
        self.outputs.iter().position(|&x| x == original)
    }

    // returns reordering which applied to transaction makes it bip69
    // the sort is stable, so equal keys keep their relative order
    pub fn from_tx_to_bip69(tx: &Transaction) -> TransactionReordering {
        let mut inp_ind: Vec<u32> = (0u32..tx.input.len() as u32).collect();
        let mut out_ind: Vec<u32> = (0u32..tx.output.len() as u32).collect();

        // txids are compared in the byte order they are displayed in
        let display_order = |i: u32| {
            let mut h = tx.input[i as usize].previous_output.txid.into_inner();
            h.reverse();
            h
        };

        inp_ind.sort_by(|i, j| {
            let prev_hash_ordering = display_order(*i).cmp(&display_order(*j));
            let index_ordering = tx.input[*i as usize].previous_output.vout
                .cmp(&tx.input[*j as usize].previous_output.vout);
            prev_hash_ordering.then(index_ordering)
        });
        out_ind.sort_by(|i, j| {
            let amount_ordering = tx.output[*i as usize].value.cmp(&tx.output[*j as usize].value);
            let sc1 = tx.output[*i as usize].script_pubkey.as_bytes();
            let sc2 = tx.output[*j as usize].script_pubkey.as_bytes();
            amount_ordering.then(sc1.cmp(sc2))
        });

        TransactionReordering {
            inputs: inp_ind,
            outputs: out_ind,
        }
    }
}

// checks if numbers are permutation of 0..len(v)
fn is_permutation(v: &[u32]) -> bool {
    let mut a = v.to_vec();
    a.sort_unstable();
    a.iter().enumerate().all(|(i, &x)| x == i as u32)
}

// Reorder inputs and outputs of the transaction. Ordering is defined in BIP69
pub fn reorder_tx(tx: &mut Transaction) -> TransactionReordering {
    let reordering = TransactionReordering::from_tx_to_bip69(tx);
    reordering.apply(tx);
    reordering
}

#[cfg(test)]
mod tests {
    use super::{is_permutation, TransactionReordering, reorder_tx};
    use dependencies::bitcoin::{Transaction, TxIn, TxOut, OutPoint, Script, Sequence, Witness, PackedLockTime};
    use crate::tools::s2script;

    fn tx_in(txid: &str, vout: u32) -> TxIn {
        TxIn {
            previous_output: OutPoint {
                txid: txid.parse().unwrap(),
                vout: vout,
            },
            script_sig: Script::new(),
            sequence: Sequence(0xFFFFFFFF),
            witness: Witness::new(),
        }
    }

    fn tx(input: Vec<TxIn>, output: Vec<TxOut>) -> Transaction {
        Transaction {
            version: 1,
            lock_time: PackedLockTime(0),
            input: input,
            output: output,
        }
    }

    // first example from BIP-69
    fn get_bip69_ex1() -> Transaction {
        tx(
            vec![
                tx_in("35288d269cee1941eaebb2ea85e32b42cdb2b04284a56d8b14dcc3f5c65d6055", 0),
                tx_in("35288d269cee1941eaebb2ea85e32b42cdb2b04284a56d8b14dcc3f5c65d6055", 1),
            ],
            vec![
                TxOut {
                    value: 100000000,
                    script_pubkey: s2script("41046a0765b5865641ce08dd39690aade26dfbf5511430ca428a3089261361cef170e3929a68aee3d8d4848b0c5111b0a37b82b86ad559fd2a745b44d8e8d9dfdc0cac"),
                },
                TxOut {
                    value: 2400000000,
                    script_pubkey: s2script("41044a656f065871a353f216ca26cef8dde2f03e8c16202d2e8ad769f02032cb86a5eb5e56842e92e19141d60a01928f8dd2c875a390f67c1f6c94cfc617c0ea45afac"),
                },
            ],
        )
    }

    // second example from BIP-69, already sorted
    fn get_bip69_ex2() -> Transaction {
        let inputs = [
            ("0e53ec5dfb2cb8a71fec32dc9a634a35b7e24799295ddd5278217822e0b31f57", 0),
            ("26aa6e6d8b9e49bb0630aac301db6757c02e3619feb4ee0eea81eb1672947024", 1),
            ("28e0fdd185542f2c6ea19030b0796051e7772b6026dd5ddccd7a2f93b73e6fc2", 0),
            ("381de9b9ae1a94d9c17f6a08ef9d341a5ce29e2e60c36a52d333ff6203e58d5d", 1),
            ("3b8b2f8efceb60ba78ca8bba206a137f14cb5ea4035e761ee204302d46b98de2", 0),
            ("402b2c02411720bf409eff60d05adad684f135838962823f3614cc657dd7bc0a", 1),
            ("54ffff182965ed0957dba1239c27164ace5a73c9b62a660c74b7b7f15ff61e7a", 1),
            ("643e5f4e66373a57251fb173151e838ccd27d279aca882997e005016bb53d5aa", 0),
            ("6c1d56f31b2de4bfc6aaea28396b333102b1f600da9c6d6149e96ca43f1102b1", 1),
            ("7a1de137cbafb5c70405455c49c5104ca3057a1f1243e6563bb9245c9c88c191", 0),
            ("7d037ceb2ee0dc03e82f17be7935d238b35d1deabf953a892a4507bfbeeb3ba4", 1),
            ("a5e899dddb28776ea9ddac0a502316d53a4a3fca607c72f66c470e0412e34086", 0),
            ("b4112b8f900a7ca0c8b0e7c4dfad35c6be5f6be46b3458974988e1cdb2fa61b8", 0),
            ("bafd65e3c7f3f9fdfdc1ddb026131b278c3be1af90a4a6ffa78c4658f9ec0c85", 0),
            ("de0411a1e97484a2804ff1dbde260ac19de841bebad1880c782941aca883b4e9", 1),
            ("f0a130a84912d03c1d284974f563c5949ac13f8342b8112edff52971599e6a45", 0),
            ("f320832a9d2e2452af63154bc687493484a0e7745ebd3aaf9ca19eb80834ad60", 0),
        ];
        tx(
            inputs.iter().map(|&(txid, vout)| tx_in(txid, vout)).collect(),
            vec![
                TxOut {
                    value: 400057456,
                    script_pubkey: s2script("76a9144a5fba237213a062f6f57978f796390bdcf8d01588ac"),
                },
                TxOut {
                    value: 40000000000,
                    script_pubkey: s2script("76a9145be32612930b8323add2212a4ec03c1562084f8488ac"),
                },
            ],
        )
    }

    fn identity(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    #[test]
    fn test_is_permutation() {
        assert_eq!(is_permutation(&[0, 1, 2]), true);
        assert_eq!(is_permutation(&[1, 2, 3]), false);
        assert_eq!(is_permutation(&[3, 1, 2, 0]), true);
        assert_eq!(is_permutation(&[0, 1, 1, 2]), false);
        assert_eq!(is_permutation(&[]), true);
    }

    #[test]
    fn test_from_tx_to_bip69_1() {
        let mut tx = get_bip69_ex1();
        assert_eq!(TransactionReordering::from_tx_to_bip69(&tx), TransactionReordering {
            inputs: vec![0, 1],
            outputs: vec![0, 1],
        });
        assert!(TransactionReordering {
            inputs: vec![1, 0],
            outputs: vec![1, 0],
        }.apply(&mut tx));
        assert_eq!(TransactionReordering::from_tx_to_bip69(&tx), TransactionReordering {
            inputs: vec![1, 0],
            outputs: vec![1, 0],
        });
    }

    #[test]
    fn test_from_tx_to_bip69_2() {
        let mut tx = get_bip69_ex2();
        assert_eq!(TransactionReordering::from_tx_to_bip69(&tx), TransactionReordering {
            inputs: identity(17),
            outputs: vec![0, 1],
        });

        // rotate the first input to the end
        let mut rotated = identity(17);
        rotated.rotate_left(1);
        TransactionReordering {
            inputs: rotated,
            outputs: vec![0, 1],
        }.apply(&mut tx);

        let mut expected = identity(17);
        expected.rotate_right(1);
        assert_eq!(TransactionReordering::from_tx_to_bip69(&tx), TransactionReordering {
            inputs: expected,
            outputs: vec![0, 1],
        });
    }

    #[test]
    fn test_reorder_tx_restores_bip69() {
        let original = get_bip69_ex2();
        let mut tx = original.clone();
        assert_eq!(reorder_tx(&mut tx).inputs, identity(17));
        assert_eq!(tx, original);

        let mut reversed = identity(17);
        reversed.reverse();
        TransactionReordering {
            inputs: reversed.clone(),
            outputs: vec![1, 0],
        }.apply(&mut tx);

        assert_eq!(reorder_tx(&mut tx), TransactionReordering {
            inputs: reversed,
            outputs: vec![1, 0],
        });
        assert_eq!(tx, original);
    }

    #[test]
    fn apply_rejects_wrong_size() {
        let mut tx = get_bip69_ex1();
        let reordering = TransactionReordering {
            inputs: vec![0],
            outputs: vec![0, 1],
        };
        assert!(!reordering.apply(&mut tx));
        assert_eq!(tx, get_bip69_ex1());
    }

    #[test]
    fn new_positions() {
        let reordering = TransactionReordering {
            inputs: vec![2, 0, 1],
            outputs: vec![1, 0],
        };
        assert_eq!(reordering.new_input_position(2), Some(0));
        assert_eq!(reordering.new_input_position(1), Some(2));
        assert_eq!(reordering.new_input_position(3), None);
        assert_eq!(reordering.new_output_position(0), Some(1));
    }
}
